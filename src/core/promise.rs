use serde_json::Value;
use tokio::sync::oneshot;

/// 成功時是 JSON 值，失敗時是錯誤訊息
pub type Completion = std::result::Result<Value, String>;

/// A single-assignment slot that any number of waiters can subscribe to.
///
/// Backs workflow promises and workflow run results.
#[derive(Debug, Default)]
pub struct PromiseSlot {
    completion: Option<Completion>,
    waiters: Vec<oneshot::Sender<Completion>>,
}

impl PromiseSlot {
    /// Completes the slot. Returns `false` if it was already completed.
    pub fn complete(&mut self, completion: Completion) -> bool {
        if self.completion.is_some() {
            return false;
        }
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(completion.clone());
        }
        self.completion = Some(completion);
        true
    }

    pub fn subscribe(&mut self) -> oneshot::Receiver<Completion> {
        let (tx, rx) = oneshot::channel();
        match &self.completion {
            Some(completion) => {
                let _ = tx.send(completion.clone());
            }
            None => self.waiters.push(tx),
        }
        rx
    }

    pub fn peek(&self) -> Option<&Completion> {
        self.completion.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_waiters_before_and_after_completion() {
        let mut slot = PromiseSlot::default();
        let early = slot.subscribe();

        assert!(slot.complete(Ok(json!("secret"))));
        assert!(!slot.complete(Ok(json!("other"))));

        let late = slot.subscribe();
        assert_eq!(early.await.unwrap(), Ok(json!("secret")));
        assert_eq!(late.await.unwrap(), Ok(json!("secret")));
        assert_eq!(slot.peek(), Some(&Ok(json!("secret"))));
    }

    #[test]
    fn test_rejection_is_kept() {
        let mut slot = PromiseSlot::default();
        slot.complete(Err("declined".to_string()));
        assert_eq!(slot.peek(), Some(&Err("declined".to_string())));
    }
}
