use futures::{pin_mut, select, FutureExt};
use instant::Instant;
use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;
use tracing::{debug, info};

/// Call `on_tick` at a fixed pace until it breaks or `shutdown` resolves
///
/// Missed ticks are skipped rather than bursted. Returns the number of ticks run.
pub async fn drive<Sh, T>(tick_interval: Duration, shutdown: Sh, mut on_tick: T) -> u64
where
    Sh: Future<Output = ()>,
    T: FnMut(Instant) -> ControlFlow<()>,
{
    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let shutdown = shutdown.fuse();
    pin_mut!(shutdown);

    let mut ticks = 0;
    loop {
        let tick = interval.tick().fuse();
        pin_mut!(tick);

        select! {
            _ = tick => {
                ticks += 1;
                if on_tick(Instant::now()).is_break() {
                    debug!("Driver stopped after {} ticks", ticks);
                    break;
                }
            }
            _ = shutdown => {
                info!("🛑 Shutdown requested after {} ticks", ticks);
                break;
            }
        }
    }
    ticks
}
