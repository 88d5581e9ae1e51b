//! HTTP+SSE transport.
//!
//! The server pushes messages on a long-lived `text/event-stream` response.
//! Its first `endpoint` event names the URL that client messages are POSTed
//! to; every later `message` event carries one JSON-RPC message.

use eventsource_stream::{Event, EventStreamError, Eventsource};
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use reqwest::Url;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tracing::debug;

use crate::error::{Error, Result};
use crate::transport::{MAX_MESSAGE_SIZE, Transport};

type EventStream =
    BoxStream<'static, std::result::Result<Event, EventStreamError<reqwest::Error>>>;

/// JSON-RPC over an SSE stream plus HTTP POSTs.
pub struct SseTransport {
    http: reqwest::Client,
    endpoint: Url,
    events: Option<EventStream>,
}

impl SseTransport {
    /// Open the event stream at `url` and wait for the server's endpoint.
    pub async fn connect(url: &str) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| Error::Endpoint(format!("{url}: {e}")))?;
        let http = reqwest::Client::new();

        let response = http
            .get(url.clone())
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?
            .error_for_status()?;

        let mut events: EventStream = response.bytes_stream().eventsource().boxed();

        let endpoint = loop {
            let event = next_event(&mut events).await?;
            if event.event == "endpoint" {
                break url
                    .join(event.data.trim())
                    .map_err(|e| Error::Endpoint(format!("{}: {e}", event.data)))?;
            }
            debug!(event = %event.event, "ignoring event before endpoint");
        };

        debug!(%endpoint, "SSE session established");

        Ok(Self {
            http,
            endpoint,
            events: Some(events),
        })
    }

    /// URL that messages are posted to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

async fn next_event(events: &mut EventStream) -> Result<Event> {
    match events.next().await {
        Some(Ok(event)) => Ok(event),
        Some(Err(e)) => Err(Error::EventStream(e.to_string())),
        None => Err(Error::ServerExited),
    }
}

impl Transport for SseTransport {
    async fn send(&mut self, message: &str) -> Result<()> {
        if self.events.is_none() {
            return Err(Error::ServerExited);
        }
        self.http
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(message.to_string())
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn receive(&mut self) -> Result<String> {
        let events = self.events.as_mut().ok_or(Error::ServerExited)?;
        loop {
            let event = next_event(events).await?;
            // An event without a type field is a `message` event.
            if event.event.is_empty() || event.event == "message" {
                if event.data.len() > MAX_MESSAGE_SIZE {
                    return Err(Error::OutputTooLarge {
                        size: event.data.len(),
                        max: MAX_MESSAGE_SIZE,
                    });
                }
                return Ok(event.data);
            }
            debug!(event = %event.event, "ignoring SSE event");
        }
    }

    async fn close(&mut self) -> Result<()> {
        // Dropping the response body ends the server-side session.
        self.events = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_malformed_url() {
        match SseTransport::connect("not a url").await {
            Err(Error::Endpoint(message)) => assert!(message.contains("not a url")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("connect should fail"),
        }
    }
}
