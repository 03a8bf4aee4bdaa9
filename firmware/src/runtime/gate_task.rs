use embassy_time::Ticker;
use gate_core::telemetry::TelemetryRecorder;

use super::BoardController;
use crate::gate::{FirmwareInstant, TICK_PERIOD};
use crate::telemetry::{LogCursor, LogSender};

#[embassy_executor::task]
pub async fn run(controller: &'static mut BoardController, log: LogSender<'static>) -> ! {
    let mut telemetry: TelemetryRecorder<FirmwareInstant> = TelemetryRecorder::new();
    let mut cursor = LogCursor::new();

    let timeout = controller.startup(&mut telemetry, FirmwareInstant::now());
    defmt::info!(
        "gate: ready, safety timeout {=u64}ms",
        u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)
    );
    cursor.forward(&telemetry, &log);

    let mut reported_drops = 0;
    let mut ticker = Ticker::every(TICK_PERIOD);
    loop {
        ticker.next().await;
        let outcome = controller.tick(&mut telemetry, FirmwareInstant::now());
        if let Some(reason) = outcome.stopped {
            defmt::debug!("gate: stopped ({=str})", reason.label());
        }
        cursor.forward(&telemetry, &log);

        if cursor.dropped() != reported_drops {
            reported_drops = cursor.dropped();
            defmt::warn!("gate: log queue full, {=u32} records dropped", reported_drops);
        }
    }
}
