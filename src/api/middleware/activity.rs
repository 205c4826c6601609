//! Idle-deadline reset and in-flight tracking
//!
//! A request counts as active until its response body has been fully sent
//! or dropped. Upgraded connections keep a clone of the lease for the
//! lifetime of the tunnel (see the proxy).

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use bytes::Bytes;
use http_body::{Body as HttpBody, Frame, SizeHint};

use crate::api::state::AppState;
use crate::lifecycle::ActivityGuard;

pub async fn track_activity(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let guard = state.runtime.begin_request();
    request.extensions_mut().insert(guard.clone());

    let response = next.run(request).await;

    response.map(|body| Body::new(TrackedBody { inner: body, _guard: guard }))
}

/// Response body that releases its activity lease when dropped
struct TrackedBody {
    inner: Body,
    _guard: ActivityGuard,
}

impl HttpBody for TrackedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        Pin::new(&mut self.inner).poll_frame(cx)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
