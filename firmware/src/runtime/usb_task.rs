use embassy_futures::join::join;
use embassy_stm32 as hal;
use embassy_stm32::Peri;
use embassy_usb::class::hid::HidWriter;
use embassy_usb::driver::Driver;

use super::USB_STORAGE;
use crate::usb::{self, HidFrame, MAX_REPORT_SIZE, REPORT_QUEUE, UsbDeviceStrings};

embassy_stm32::bind_interrupts!(struct UsbIrqs {
    USB_UCPD1_2 => embassy_stm32::usb::InterruptHandler<hal::peripherals::USB>;
});

#[embassy_executor::task]
pub async fn run(
    usb: Peri<'static, hal::peripherals::USB>,
    dp: Peri<'static, hal::peripherals::PA12>,
    dm: Peri<'static, hal::peripherals::PA11>,
) -> ! {
    let storage = USB_STORAGE.init(usb::UsbDeviceStorage::new());
    let driver = embassy_stm32::usb::Driver::new(usb, UsbIrqs, dp, dm);

    let usb::UsbComposite {
        mut device,
        keyboard,
        mouse,
    } = usb::UsbComposite::new(driver, storage, UsbDeviceStrings::default());

    join(device.run(), forward_reports(keyboard, mouse)).await;
    loop {
        core::future::pending::<()>().await;
    }
}

async fn forward_reports<D>(
    mut keyboard: HidWriter<'static, D, MAX_REPORT_SIZE>,
    mut mouse: HidWriter<'static, D, MAX_REPORT_SIZE>,
) -> !
where
    D: Driver<'static>,
{
    let mut buf = [0u8; MAX_REPORT_SIZE];
    loop {
        let frame = REPORT_QUEUE.receive().await;
        let result = match frame {
            HidFrame::Keyboard(_) => keyboard.write(frame.encode(&mut buf)).await,
            HidFrame::Mouse(_) => mouse.write(frame.encode(&mut buf)).await,
        };
        if let Err(err) = result {
            defmt::warn!("usb: report write failed: {}", defmt::Debug2Format(&err));
        }
    }
}
