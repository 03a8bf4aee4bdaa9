use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::flash::Flash;
use embassy_stm32::gpio::{Input, Level, Output, Pull, Speed};
use gate_core::config::GateConfig;
use gate_core::controller::GateController;
use static_cell::StaticCell;

use crate::gate::flash::FlashTimeoutStore;
use crate::gate::{BoardDriver, BoardSensors, FirmwareInstant};
use crate::telemetry::LogChannel;

mod gate_task;
mod log_task;

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

pub(super) type BoardController = GateController<
    BoardSensors<'static>,
    BoardDriver<'static>,
    FlashTimeoutStore<'static>,
    FirmwareInstant,
>;

pub(super) static LOG_CHANNEL: LogChannel = LogChannel::new();
static CONTROLLER: StaticCell<BoardController> = StaticCell::new();

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA5,
        PA6,
        PA7,
        PA8,
        PB3,
        PB4,
        PB5,
        PC6,
        PC7,
        FLASH,
        ..
    } = hal::init(config);

    let sensors = BoardSensors::new(
        Input::new(PB4, Pull::Down),
        Input::new(PB5, Pull::Down),
        Input::new(PB3, Pull::Down),
        Input::new(PA8, Pull::Down),
    );

    let driver = BoardDriver::new(
        Output::new(PA6, Level::Low, Speed::Low),
        Output::new(PA7, Level::Low, Speed::Low),
        Output::new(PC6, Level::Low, Speed::Low),
        Output::new(PC7, Level::Low, Speed::Low),
        Output::new(PA5, Level::Low, Speed::Low),
    );

    let store = FlashTimeoutStore::new(Flash::new_blocking(FLASH));

    let controller = CONTROLLER.init(GateController::new(
        sensors,
        driver,
        store,
        GateConfig::default(),
    ));

    spawner
        .spawn(log_task::run(LOG_CHANNEL.receiver()))
        .expect("failed to spawn log task");

    spawner
        .spawn(gate_task::run(controller, LOG_CHANNEL.sender()))
        .expect("failed to spawn gate task");

    core::future::pending::<()>().await;
}
