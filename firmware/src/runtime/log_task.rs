use crate::telemetry::{LogReceiver, emit};

#[embassy_executor::task]
pub async fn run(receiver: LogReceiver<'static>) -> ! {
    loop {
        let line = receiver.receive().await;
        emit(&line);
    }
}
