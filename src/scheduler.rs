use crate::sweep::{SweepOutcome, Sweeper};
use std::io;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Sweep counts kept by the scheduler thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepTally {
    /// Every tick that called into the sweeper, whatever came of it.
    pub attempted: usize,
    /// Sweeps that ran to the end.
    pub completed: usize,
}

/// Runs a sweep immediately, then once per `interval` on a dedicated thread.
///
/// Sweeps never overlap: they run one after another on the scheduler thread
/// and ticks that elapse while a sweep is still running are dropped.
pub struct Scheduler {
    stop_tx: Sender<()>,
    done_rx: Receiver<SweepTally>,
    handle: JoinHandle<()>,
}

impl Scheduler {
    /// `max_attempts` stops the scheduler on its own after that many ticks.
    pub fn start(
        sweeper: Arc<Sweeper>,
        interval: Duration,
        max_attempts: Option<usize>,
    ) -> io::Result<Scheduler> {
        let (stop_tx, stop_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();

        let handle = thread::Builder::new()
            .name("sweep-scheduler".to_string())
            .spawn(move || {
                let tally = run_loop(&sweeper, interval, max_attempts, &stop_rx);
                let _ = done_tx.send(tally);
            })?;

        info!(
            "Sweep scheduled every {} minutes",
            interval.as_secs_f64() / 60.0
        );
        Ok(Scheduler {
            stop_tx,
            done_rx,
            handle,
        })
    }

    /// Block until the scheduler stops by itself.
    pub fn wait(self) -> SweepTally {
        let Scheduler {
            stop_tx,
            done_rx,
            handle,
        } = self;
        let tally = done_rx.recv().unwrap_or_default();
        let _ = handle.join();
        drop(stop_tx);
        tally
    }

    /// Ask the scheduler to stop and give an in-flight sweep up to `grace` to
    /// finish. Returns `None` when the sweep had to be abandoned; the
    /// scheduler thread is then left detached.
    pub fn shutdown(self, grace: Duration) -> Option<SweepTally> {
        let _ = self.stop_tx.send(());
        match self.done_rx.recv_timeout(grace) {
            Ok(tally) => {
                let _ = self.handle.join();
                info!(
                    "Scheduler stopped: {} sweeps completed out of {} attempts",
                    tally.completed, tally.attempted
                );
                Some(tally)
            }
            Err(_) => {
                warn!(
                    "Sweep still running after {:.0}s grace period, abandoning it",
                    grace.as_secs_f64()
                );
                None
            }
        }
    }
}

fn run_loop(
    sweeper: &Sweeper,
    interval: Duration,
    max_attempts: Option<usize>,
    stop_rx: &Receiver<()>,
) -> SweepTally {
    let mut tally = SweepTally::default();
    let mut next_tick = Instant::now();

    loop {
        match sweeper.run_once() {
            Ok(SweepOutcome::Completed(_)) => tally.completed += 1,
            Ok(SweepOutcome::Skipped) => info!("Previous sweep still running, tick skipped"),
            Err(e) => error!("Sweep failed, retrying on next tick: {}", e),
        }
        tally.attempted += 1;

        if max_attempts.is_some_and(|max| tally.attempted >= max) {
            break;
        }

        let Some((tick, missed)) = following_tick(next_tick, interval, Instant::now()) else {
            warn!("No further sweep can be scheduled, waiting for stop");
            let _ = stop_rx.recv();
            break;
        };
        if missed > 0 {
            warn!("Sweep overran its interval, {} tick(s) skipped", missed);
        }
        next_tick = tick;

        match stop_rx.recv_timeout(next_tick.saturating_duration_since(Instant::now())) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => continue,
        }
    }

    tally
}

/// First tick after `previous` on the fixed schedule that is still ahead of
/// `now`, with the number of ticks passed over to reach it. `None` when that
/// instant cannot be represented.
fn following_tick(previous: Instant, interval: Duration, now: Instant) -> Option<(Instant, u32)> {
    let next = previous.checked_add(interval)?;
    if next > now {
        return Some((next, 0));
    }
    let behind = now.duration_since(next).as_nanos();
    let missed = u32::try_from(behind / interval.as_nanos().max(1) + 1).ok()?;
    let tick = next.checked_add(interval.checked_mul(missed)?)?;
    Some((tick, missed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_on_time_sweep_keeps_schedule() {
        let start = Instant::now();
        let interval = Duration::from_secs(60);

        let (tick, missed) = following_tick(start, interval, start + Duration::from_secs(10)).unwrap();
        assert_eq!(tick, start + interval);
        assert_eq!(missed, 0);
    }

    #[test]
    fn test_overrun_skips_elapsed_ticks_and_keeps_phase() {
        let start = Instant::now();
        let interval = Duration::from_secs(60);

        // Sweep finished 150s after the previous tick: ticks at 60s and 120s
        // are gone, the next one lands at 180s.
        let (tick, missed) = following_tick(start, interval, start + Duration::from_secs(150)).unwrap();
        assert_eq!(tick, start + Duration::from_secs(180));
        assert_eq!(missed, 2);

        // Finishing exactly on a tick skips it as well.
        let (tick, missed) = following_tick(start, interval, start + Duration::from_secs(60)).unwrap();
        assert_eq!(tick, start + Duration::from_secs(120));
        assert_eq!(missed, 1);
    }

    #[test]
    fn test_unrepresentable_tick_is_none() {
        let start = Instant::now();
        assert!(following_tick(start, Duration::MAX, start).is_none());
    }
}
