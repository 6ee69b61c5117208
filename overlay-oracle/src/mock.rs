use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::Mutex;

use crate::message::ChatMessage;
use crate::oracle::ChatOracle;
use crate::stream::{OracleError, StreamEvent};
use crate::tool::ToolSpec;

/// A scripted oracle for tests: each call to `stream` pops and replays the
/// next queued script, in order. Queuing `Vec::new()` scripts a turn that
/// yields only `Done`, the "nothing to say" case the reasoning loop has to
/// handle.
pub struct MockOracle {
    scripts: Mutex<Vec<Vec<StreamEvent>>>,
    calls: Mutex<Vec<(Vec<ChatMessage>, Vec<ToolSpec>)>>,
}

impl MockOracle {
    pub fn new(scripts: Vec<Vec<StreamEvent>>) -> Self {
        Self { scripts: Mutex::new(scripts), calls: Mutex::new(Vec::new()) }
    }

    /// Every `(messages, tools)` pair passed to `stream`, in call order —
    /// lets tests assert on what the reasoning loop actually sent.
    pub async fn recorded_calls(&self) -> Vec<(Vec<ChatMessage>, Vec<ToolSpec>)> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl ChatOracle for MockOracle {
    async fn stream(
        &self,
        messages: Vec<ChatMessage>,
        tools: Vec<ToolSpec>,
    ) -> Result<BoxStream<'static, Result<StreamEvent, OracleError>>, OracleError> {
        self.calls.lock().await.push((messages, tools));
        let mut scripts = self.scripts.lock().await;
        let script = if scripts.is_empty() {
            vec![StreamEvent::Done]
        } else {
            scripts.remove(0)
        };
        Ok(stream::iter(script.into_iter().map(Ok)).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_scripts_in_order() {
        let oracle = MockOracle::new(vec![
            vec![StreamEvent::TextDelta("hi".into()), StreamEvent::Done],
            vec![StreamEvent::Done],
        ]);

        let mut first = oracle.stream(vec![], vec![]).await.unwrap();
        assert_eq!(first.next().await.unwrap().unwrap(), StreamEvent::TextDelta("hi".into()));
        assert_eq!(first.next().await.unwrap().unwrap(), StreamEvent::Done);
        assert!(first.next().await.is_none());

        let mut second = oracle.stream(vec![], vec![]).await.unwrap();
        assert_eq!(second.next().await.unwrap().unwrap(), StreamEvent::Done);
    }

    #[tokio::test]
    async fn exhausted_queue_yields_done() {
        let oracle = MockOracle::new(vec![]);
        let mut stream = oracle.stream(vec![], vec![]).await.unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), StreamEvent::Done);
    }

    #[tokio::test]
    async fn records_every_call() {
        let oracle = MockOracle::new(vec![vec![StreamEvent::Done]]);
        let messages = vec![ChatMessage::user("hello")];
        oracle.stream(messages.clone(), vec![]).await.unwrap();
        let calls = oracle.recorded_calls().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, messages);
    }
}
