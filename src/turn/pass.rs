//! Relay of one generation pass.

use crate::cancel::CancelToken;
use crate::filter::OutputFilter;
use crate::provider::{ProviderError, TextStream};
use futures_util::{Stream, StreamExt};

/// What a pass produced, in order.
#[derive(Debug)]
pub(crate) enum PassEvent {
    /// Filtered text ready for the caller.
    Text(String),
    /// The token was observed set; nothing more follows.
    Cancelled,
    /// The committed provider failed mid-stream; nothing more follows.
    StreamFailed(ProviderError),
    /// The source ended; carries the unfiltered text of the whole pass.
    Finished(String),
}

/// Pull `source` through `filter`, accumulating the raw text.
///
/// The token is checked before every emission and while waiting for the
/// next fragment, so a hung provider does not delay cancellation.
pub(crate) fn relay(
    mut source: TextStream,
    mut filter: OutputFilter,
    token: CancelToken,
) -> impl Stream<Item = PassEvent> + Send {
    async_stream::stream! {
        let mut raw = String::new();
        loop {
            if token.is_cancelled() {
                yield PassEvent::Cancelled;
                return;
            }
            let next = tokio::select! {
                biased;
                () = token.cancelled() => None,
                item = source.next() => Some(item),
            };
            let Some(item) = next else {
                yield PassEvent::Cancelled;
                return;
            };
            match item {
                Some(Ok(fragment)) => {
                    raw.push_str(&fragment);
                    if let Some(text) = filter.push(&fragment) {
                        if token.is_cancelled() {
                            yield PassEvent::Cancelled;
                            return;
                        }
                        yield PassEvent::Text(text);
                    }
                }
                Some(Err(e)) => {
                    yield PassEvent::StreamFailed(e);
                    return;
                }
                None => {
                    if let Some(text) = filter.finish() {
                        if token.is_cancelled() {
                            yield PassEvent::Cancelled;
                            return;
                        }
                        yield PassEvent::Text(text);
                    }
                    yield PassEvent::Finished(raw);
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DirectiveConfig, FilterConfig};
    use crate::directive::DirectiveParser;
    use crate::filter::Scrubber;

    fn filter(threshold: usize) -> OutputFilter {
        let scrubber = Scrubber::new(&DirectiveParser::new(&DirectiveConfig::default()));
        OutputFilter::new(
            &FilterConfig {
                buffer_threshold: threshold,
            },
            scrubber,
        )
    }

    fn source(items: Vec<Result<String, ProviderError>>) -> TextStream {
        Box::pin(futures_util::stream::iter(items))
    }

    #[tokio::test]
    async fn raw_text_is_kept_while_markup_is_filtered() {
        let events: Vec<PassEvent> = relay(
            source(vec![
                Ok("Okay. EXECUTE: ".into()),
                Ok("timer --minutes 5".into()),
            ]),
            filter(1000),
            CancelToken::new(),
        )
        .collect()
        .await;
        assert!(matches!(&events[0], PassEvent::Text(t) if t == "Okay."));
        assert!(
            matches!(&events[1], PassEvent::Finished(raw) if raw == "Okay. EXECUTE: timer --minutes 5")
        );
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn stream_error_ends_without_more_text() {
        let events: Vec<PassEvent> = relay(
            source(vec![
                Ok("Hello there.".into()),
                Err(ProviderError::Stream("reset".into())),
                Ok("never".into()),
            ]),
            filter(1),
            CancelToken::new(),
        )
        .collect()
        .await;
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], PassEvent::Text(t) if t == "Hello there."));
        assert!(matches!(&events[1], PassEvent::StreamFailed(_)));
    }

    #[tokio::test]
    async fn pre_cancelled_token_emits_only_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        let events: Vec<PassEvent> =
            relay(source(vec![Ok("Hi".into())]), filter(1), token).collect().await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], PassEvent::Cancelled));
    }

    #[tokio::test]
    async fn cancellation_interrupts_a_hung_source() {
        let token = CancelToken::new();
        let hung: TextStream =
            Box::pin(futures_util::stream::pending::<Result<String, ProviderError>>());
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            canceller.cancel();
        });
        let events: Vec<PassEvent> = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            relay(hung, filter(1), token).collect::<Vec<_>>(),
        )
        .await
        .unwrap_or_default();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], PassEvent::Cancelled));
    }
}
