use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::flash::Flash;
use embassy_stm32::gpio::{Input, Level, Output, Pull, Speed};
use embassy_stm32::i2c::{self, I2c};
use embassy_stm32::time::Hertz;
use embassy_time::Delay;
use static_cell::StaticCell;
use turntable_core::led::LedHandler;
use turntable_core::Adapter;
use turntable_core::bindings::{BINDING_COUNT, Bindings};
use turntable_core::link::{DjFrame, ExtensionBus, TurntableState};
use turntable_core::profile::{self, AdapterConfig};
use turntable_core::side_select::TurntableConfig;

use crate::hw::{PageFlash, PresencePin, STORE_RANGE, StatusLed};
use crate::store::FlashStore;
use crate::usb;

mod adapter_task;
mod usb_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

/// Registry slots; the binding table uses most of them.
pub(super) const HID_SLOTS: usize = 16;
const _: () = assert!(HID_SLOTS >= BINDING_COUNT);

pub(super) type ControllerBus = ExtensionBus<I2c<'static, hal::mode::Blocking>, Delay>;
pub(super) type BoardAdapter = Adapter<ControllerBus, PresencePin, StatusLed, FlashStore<PageFlash>, HID_SLOTS>;

pub(super) static USB_STORAGE: StaticCell<usb::UsbDeviceStorage> = StaticCell::new();

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA5,
        PB3,
        PB8,
        PB9,
        I2C1,
        FLASH,
        USB,
        PA11,
        PA12,
        ..
    } = hal::init(config);

    let board = profile::STM32G0B1;
    let settings = AdapterConfig::DEFAULT;

    let mut i2c_config = i2c::Config::default();
    i2c_config.frequency = Hertz(100_000);
    let bus = ExtensionBus::new(I2c::new_blocking(I2C1, PB8, PB9, i2c_config), Delay);

    let presence = PresencePin::new(Input::new(PB3, Pull::Down));
    let led = LedHandler::new(
        StatusLed::new(Output::new(PA5, Level::Low, Speed::Low)),
        board.led_inverted,
    );
    let store = FlashStore::new(PageFlash::new(Flash::new_blocking(FLASH)), STORE_RANGE);
    let side_config = TurntableConfig::new(
        store,
        Some(DjFrame::euphoria_pressed),
        Some(TurntableState::blue_pressed),
        settings.config_stable_time,
    );

    let mut adapter: BoardAdapter = Adapter::new(bus, presence, led, side_config, &settings);
    let bindings = Bindings::register(adapter.hid_mut()).expect("binding table exceeds HID slots");

    defmt::info!("boot: board {}", board.name);

    spawner
        .spawn(usb_task::run(USB, PA12, PA11))
        .expect("failed to spawn USB task");

    spawner
        .spawn(adapter_task::run(adapter, bindings))
        .expect("failed to spawn adapter task");

    core::future::pending::<()>().await;
}
