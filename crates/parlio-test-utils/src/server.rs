// SPDX-FileCopyrightText: 2026 Parlio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A wiremock-backed mock conversation server.
//!
//! Serves scripted SSE frame sequences on the job-events and message-send
//! endpoints so transport and session tests can drive the full
//! Transport -> Decoder -> Processor path against real HTTP.

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A mock sync server with scripted event streams.
pub struct MockEventServer {
    server: MockServer,
}

impl MockEventServer {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Base URL to hand to the engine's config.
    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Access to the underlying wiremock server for custom expectations.
    pub fn inner(&self) -> &MockServer {
        &self.server
    }

    /// Serves the given frames on `GET /jobs/{job}/events`. The body is
    /// finite, so the stream ends gracefully after the last frame.
    pub async fn serve_job_events(&self, job: &str, frames: &[String]) {
        Mock::given(method("GET"))
            .and(path(format!("/jobs/{job}/events")))
            .respond_with(sse_response(frames))
            .mount(&self.server)
            .await;
    }

    /// Serves `count` consecutive failures on the job-events endpoint before
    /// any other mounted success mock applies.
    pub async fn fail_job_events(&self, job: &str, status: u16, count: u64) {
        Mock::given(method("GET"))
            .and(path(format!("/jobs/{job}/events")))
            .respond_with(ResponseTemplate::new(status))
            .up_to_n_times(count)
            .mount(&self.server)
            .await;
    }

    /// Serves the given frames as the response to
    /// `POST /threads/{thread}/messages`.
    pub async fn serve_send_response(&self, thread: &str, frames: &[String]) {
        Mock::given(method("POST"))
            .and(path(format!("/threads/{thread}/messages")))
            .respond_with(sse_response(frames))
            .mount(&self.server)
            .await;
    }
}

fn sse_response(frames: &[String]) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(frames.concat())
}
