// Poll loop turning a telemetry source into a stream of frames

use std::sync::mpsc::Sender;
use std::time::Duration;

use crate::errors::PitwallError;
use crate::live::{BackoffPolicy, LiveFrame, TelemetrySource};

/// Poll a telemetry source and forward every frame to the subscriber,
/// teeing a copy to the recorder channel when one is given.
///
/// Failures never kill the stream outright: the loop retries with the
/// policy's growing delay and a successful poll resets the failure
/// count. The loop ends in one of three ways:
///
/// * the subscriber hangs up, which is a clean `Ok(())`
/// * the recorder hangs up while recording was requested, an error
/// * the policy's failure budget runs out, an error
pub fn stream_telemetry(
    mut source: impl TelemetrySource,
    frame_sender: Sender<LiveFrame>,
    recorder_sender: Option<Sender<LiveFrame>>,
    poll_interval: Duration,
    backoff: BackoffPolicy,
) -> Result<(), PitwallError> {
    use log::{debug, error, info, warn};

    source.connect()?;
    info!("Streaming live telemetry from {}", source.endpoint());

    let mut consecutive_failures: u32 = 0;

    loop {
        match source.poll() {
            Ok(frame) => {
                if consecutive_failures > 0 {
                    info!(
                        "Device link recovered after {} failed polls",
                        consecutive_failures
                    );
                }
                consecutive_failures = 0;

                if frame_sender.send(frame.clone()).is_err() {
                    debug!("Subscriber hung up, stopping stream");
                    return Ok(());
                }

                if let Some(recorder) = &recorder_sender {
                    recorder.send(frame)?;
                }
            }
            Err(e) => {
                consecutive_failures += 1;

                if backoff.exhausted(consecutive_failures) {
                    error!(
                        "Giving up on {} after {} consecutive poll failures",
                        source.endpoint(),
                        consecutive_failures
                    );
                    return Err(PitwallError::ReconnectExhausted {
                        attempts: consecutive_failures,
                    });
                }

                warn!(
                    "Poll failed ({}), retry {} in {:?}",
                    e,
                    consecutive_failures,
                    backoff.delay_after(consecutive_failures)
                );
            }
        }

        let wait = if consecutive_failures == 0 {
            poll_interval
        } else {
            backoff.delay_after(consecutive_failures)
        };
        if !wait.is_zero() {
            std::thread::sleep(wait);
        }
    }
}
