//! First-reply race between cancellable awaits

use std::time::Duration;

use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;

/// Await every arm concurrently and return the first `Some`
///
/// Arms that finish with `None` drop out of the race. Returns `None` when
/// every arm gave up or `timeout` elapsed. Arms still running at that point
/// are dropped, which cancels them.
pub async fn first_reply<T>(arms: Vec<BoxFuture<'_, Option<T>>>, timeout: Duration) -> Option<T> {
    let mut pending: FuturesUnordered<_> = arms.into_iter().collect();

    let race = async {
        while let Some(reply) = pending.next().await {
            if reply.is_some() {
                return reply;
            }
        }
        None
    };

    tokio::time::timeout(timeout, race).await.unwrap_or_else(|_| {
        tracing::debug!(timeout_ms = timeout.as_millis(), "no reply before timeout");
        None
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use futures::FutureExt;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_fastest_arm_wins() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Some("voice")
        }
        .boxed();
        let fast = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Some("text")
        }
        .boxed();

        assert_eq!(
            first_reply(vec![slow, fast], Duration::from_secs(10)).await,
            Some("text")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_none_arms_drop_out() {
        let gives_up = async { None }.boxed();
        let answers = async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Some(42)
        }
        .boxed();

        assert_eq!(
            first_reply(vec![gives_up, answers], Duration::from_secs(10)).await,
            Some(42)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_cancels_losers() {
        struct SetOnDrop(Arc<AtomicBool>);
        impl Drop for SetOnDrop {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let dropped = Arc::new(AtomicBool::new(false));
        let marker = SetOnDrop(Arc::clone(&dropped));
        let never = async move {
            let _marker = marker;
            std::future::pending::<()>().await;
            Some(())
        }
        .boxed();

        assert_eq!(first_reply(vec![never], Duration::from_secs(5)).await, None);
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_all_arms_give_up() {
        let arms: Vec<BoxFuture<'_, Option<u8>>> = vec![async { None }.boxed(), async { None }.boxed()];
        assert_eq!(first_reply(arms, Duration::from_secs(1)).await, None);
    }
}
