use embassy_time::{Duration, Ticker};
use turntable_core::Clock;
use turntable_core::bindings::Bindings;
use turntable_core::hid::report::HidReportState;

use super::BoardAdapter;
use crate::hw::EmbassyClock;
use crate::status;
use crate::usb::{REPORT_QUEUE, flush_reports};

const TICK: Duration = Duration::from_millis(1);

#[embassy_executor::task]
pub async fn run(mut adapter: BoardAdapter, bindings: Bindings) -> ! {
    let clock = EmbassyClock;
    let mut reports = HidReportState::new();

    match adapter.begin(clock.now()) {
        Ok(load) => defmt::info!(
            "adapter: main table {}, repaired={}",
            load.main,
            load.repaired
        ),
        Err(err) => defmt::warn!("adapter: config not loaded: {}", err),
    }

    let mut ticker = Ticker::every(TICK);
    loop {
        let now = clock.now();
        let report = adapter.tick(now, &mut reports);
        if let Some(event) = report.link {
            defmt::info!("adapter: {}", event);
        }
        if let Some(err) = report.store_error {
            defmt::warn!("adapter: {}", err);
        }
        if report.fresh
            && let Err(err) = bindings.apply_adapter(&mut adapter, &mut reports)
        {
            defmt::warn!("bindings: {}", err);
        }

        if status::usb_configured() {
            let dropped = flush_reports(&mut reports, &REPORT_QUEUE);
            if dropped > 0 {
                let total = status::record_dropped_reports(dropped);
                defmt::warn!("usb: queue full, {} reports dropped so far", total);
            }
        } else {
            // Nothing to deliver to; keep only the latest state.
            let _ = reports.take_keyboard_report();
            let _ = reports.take_mouse_report();
        }

        ticker.next().await;
    }
}
