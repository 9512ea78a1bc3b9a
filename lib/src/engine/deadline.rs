use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use anyhow::Context;

use crate::Result;
use crate::engine::Engine;
use crate::engine::Verification;
use crate::hash::HashAlgorithm;

const TRACE: bool = false;

/// Bounds the time an engine call may take.
///
/// Each call runs on a worker thread.  If it doesn't finish in time,
/// the call fails.  The worker is abandoned, and its result is
/// discarded when it eventually finishes.
pub struct Deadline<E> {
    engine: Arc<E>,
    timeout: Duration,
}

impl<E> Deadline<E>
where E: Engine + 'static,
{
    /// Wraps `engine`.
    pub fn new(engine: E, timeout: Duration) -> Self {
        Deadline {
            engine: Arc::new(engine),
            timeout,
        }
    }

    /// Returns the timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs `f` on a worker thread, and waits for at most the
    /// timeout.
    fn call<T, F>(&self, operation: &'static str, f: F) -> Result<T>
    where T: Send + 'static,
          F: FnOnce(&E) -> Result<T> + Send + 'static,
    {
        tracer!(TRACE, "Deadline::call");

        let engine = Arc::clone(&self.engine);
        let (sender, receiver) = mpsc::channel();
        thread::Builder::new()
            .name(format!("engine {}", operation))
            .spawn(move || {
                // If we timed out, nobody is listening anymore.
                let _ = sender.send(f(&engine));
            })
            .with_context(|| format!("Failed to start {}", operation))?;

        match receiver.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                t!("{} timed out", operation);
                Err(anyhow::anyhow!("{} timed out after {:?}",
                                    operation, self.timeout))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) =>
                Err(anyhow::anyhow!("{} aborted", operation)),
        }
    }
}

impl<E> Engine for Deadline<E>
where E: Engine + 'static,
{
    fn verify(&self, document: &[u8]) -> Result<Verification> {
        let document = document.to_vec();
        self.call("verify", move |e| e.verify(&document))
    }

    fn extract_message(&self, document: &[u8]) -> Result<Vec<u8>> {
        let document = document.to_vec();
        self.call("extract message", move |e| e.extract_message(&document))
    }

    fn clearsign(&self, message: &[u8], hash: &HashAlgorithm)
                 -> Result<Vec<u8>>
    {
        let message = message.to_vec();
        let hash = hash.clone();
        self.call("clearsign", move |e| e.clearsign(&message, &hash))
    }

    fn dearmor(&self, armor: &[u8]) -> Result<Vec<u8>> {
        let armor = armor.to_vec();
        self.call("dearmor", move |e| e.dearmor(&armor))
    }

    fn enarmor(&self, packets: &[u8]) -> Result<Vec<u8>> {
        let packets = packets.to_vec();
        self.call("enarmor", move |e| e.enarmor(&packets))
    }

    fn normalize(&self, packets: &[u8]) -> Result<Vec<u8>> {
        let packets = packets.to_vec();
        self.call("normalize", move |e| e.normalize(&packets))
    }
}
