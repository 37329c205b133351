use tokio::sync::oneshot;

use crate::prelude::*;

impl<T: Clone + Send + 'static> Operation<T> {
    /// <sup>[`async`](crate::asnc)</sup>
    /// Resolves once operation is completed.
    ///
    /// Dropping the returned future does not cancel the operation.
    ///
    /// ```rust
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// use chanmux::prelude::*;
    ///
    /// let operation = Operation::<u8>::pending();
    /// let completion = operation.completion();
    /// operation.complete_ok(7, false).unwrap();
    ///
    /// assert_eq!(completion.await.unwrap(), 7);
    /// # }
    /// ```
    pub async fn completion(&self) -> Result<T> {
        if let Some(result) = self.try_result() {
            return result;
        }

        let (tx, rx) = oneshot::channel();
        self.on_complete(Delivery::Inline, move |operation| {
            if let Some(result) = operation.try_result() {
                let _ = tx.send(result);
            }
        });

        rx.await.unwrap_or(Err(Error::Closed))
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn completed_elsewhere() {
        let operation = Operation::<&'static str>::pending();

        thread::spawn({
            let operation = operation.clone();
            move || {
                thread::sleep(Duration::from_millis(10));
                operation
                    .complete_error(Error::EndOfStream, false)
                    .unwrap();
            }
        });

        assert!(matches!(
            operation.completion().await,
            Err(Error::EndOfStream)
        ));
    }

    #[tokio::test]
    async fn already_completed() {
        let operation = Operation::completed_ok(42u32);
        assert_eq!(operation.completion().await.unwrap(), 42);
    }
}
