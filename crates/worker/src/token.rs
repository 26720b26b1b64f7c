use tokio_util::sync::CancellationToken;

/// Cooperative cancellation signal handed to parse work.
///
/// A signal built with [`CancelSignal::never`] can never fire; work started
/// with it is safe to share between callers. Signals wrapping a
/// [`CancellationToken`] are owned by one caller.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
	token: Option<CancellationToken>,
}

impl CancelSignal {
	/// A signal that can never be cancelled.
	pub const fn never() -> Self {
		Self { token: None }
	}

	/// Wraps a caller-owned token.
	pub fn from_token(token: CancellationToken) -> Self {
		Self { token: Some(token) }
	}

	/// Returns true if cancellation can ever be requested through this signal.
	pub fn can_be_cancelled(&self) -> bool {
		self.token.is_some()
	}

	/// Returns true when cancellation is requested.
	pub fn is_cancelled(&self) -> bool {
		self.token.as_ref().is_some_and(CancellationToken::is_cancelled)
	}

	/// Future resolving when cancellation is requested.
	///
	/// Never resolves for [`CancelSignal::never`].
	pub async fn cancelled(&self) {
		match &self.token {
			Some(token) => token.cancelled().await,
			None => std::future::pending().await,
		}
	}
}

impl From<CancellationToken> for CancelSignal {
	fn from(token: CancellationToken) -> Self {
		Self::from_token(token)
	}
}
