use tokio_util::sync::CancellationToken;

use super::*;

#[tokio::test(flavor = "multi_thread")]
async fn cached_version_returns_ready_handle() {
	let fx = Fixture::new();
	let d = doc();
	fx.entry.add_owner(project(1), false).unwrap();
	fx.entry.parse(Some(&snapshot(d, 1, "x")), None, true, &never()).unwrap();

	let pending = fx.entry.parse_async(Some(&snapshot(d, 1, "x")), None, true, never());

	assert!(pending.is_ready());
	assert_eq!(pending.operation_id(), None);
	let record = pending.await.unwrap();
	assert!(record.parse_info().is_some());
	assert_eq!(fx.parser.calls(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn same_version_requests_join_one_operation() {
	let fx = Fixture::with(TestParser::held(), StaticContent::default());
	let d = doc();
	fx.entry.add_owner(project(1), false).unwrap();

	let first = fx.entry.parse_async(Some(&snapshot(d, 1, "x")), None, true, never());
	let second = fx.entry.parse_async(Some(&snapshot(d, 1, "x")), None, false, never());

	assert!(!first.is_joined());
	assert!(second.is_joined());
	assert_eq!(first.operation_id(), second.operation_id());

	fx.parser.wait_for_calls(1).await;
	fx.parser.proceed();
	let (a, b) = tokio::join!(first.wait(), second.wait());
	let (a, b) = (a.unwrap(), b.unwrap());

	assert_eq!(fx.parser.calls(), 1);
	assert!(Arc::ptr_eq(a.parsed_file().unwrap(), b.parsed_file().unwrap()));
}

#[tokio::test(flavor = "multi_thread")]
async fn partial_operation_is_not_joined_by_full_request() {
	let fx = Fixture::with(TestParser::held(), StaticContent::default());
	let d = doc();
	fx.entry.add_owner(project(1), false).unwrap();

	let partial = fx.entry.parse_async(Some(&snapshot(d, 1, "x")), None, false, never());
	fx.parser.wait_for_calls(1).await;
	let full = fx.entry.parse_async(Some(&snapshot(d, 1, "x")), None, true, never());

	assert!(!full.is_joined());
	assert_ne!(partial.operation_id(), full.operation_id());

	fx.parser.proceed();
	fx.parser.wait_for_calls(2).await;
	fx.parser.proceed();
	assert!(partial.await.unwrap().parsed_file().is_some());
	assert!(full.await.unwrap().parse_info().is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn cancellable_requests_are_never_shared() {
	let fx = Fixture::with(TestParser::held(), StaticContent::default());
	let d = doc();
	fx.entry.add_owner(project(1), false).unwrap();
	let token = CancellationToken::new();

	let owned = fx.entry.parse_async(Some(&snapshot(d, 1, "x")), None, true, CancelSignal::from_token(token.clone()));
	let other = fx.entry.parse_async(Some(&snapshot(d, 1, "x")), None, true, never());

	assert!(!other.is_joined());
	assert_ne!(owned.operation_id(), other.operation_id());
	fx.parser.wait_for_calls(1).await;
	fx.parser.proceed();
	owned.await.unwrap();
	other.await.unwrap();
	// Whichever operation ran second found the other's commit in the cache.
	assert_eq!(fx.parser.calls(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn unversioned_requests_are_never_shared() {
	let fx = Fixture::with(TestParser::held(), StaticContent::default());
	fx.entry.add_owner(project(1), false).unwrap();

	let first = fx.entry.parse_async(Some(&TextSnapshot::unversioned("x")), None, false, never());
	let second = fx.entry.parse_async(Some(&TextSnapshot::unversioned("x")), None, false, never());

	assert!(!first.is_joined() && !second.is_joined());
	assert_ne!(first.operation_id(), second.operation_id());
	fx.parser.wait_for_calls(1).await;
	fx.parser.proceed();
	fx.parser.wait_for_calls(2).await;
	fx.parser.proceed();
	let (a, b) = tokio::join!(first.wait(), second.wait());
	let (a, b) = (a.unwrap(), b.unwrap());

	assert_eq!(fx.parser.calls(), 2);
	assert!(!Arc::ptr_eq(a.parsed_file().unwrap(), b.parsed_file().unwrap()));
	assert_eq!(fx.entry.current_version(), None);
}

#[tokio::test(flavor = "multi_thread")]
async fn cancelled_waiter_does_not_abort_shared_operation() {
	let fx = Fixture::with(TestParser::held(), StaticContent::default());
	let d = doc();
	fx.entry.add_owner(project(1), false).unwrap();

	let leader = fx.entry.parse_async(Some(&snapshot(d, 1, "x")), None, true, never());
	let token = CancellationToken::new();
	let follower = fx.entry.parse_async(Some(&snapshot(d, 1, "x")), None, true, CancelSignal::from_token(token.clone()));
	assert!(follower.is_joined());

	fx.parser.wait_for_calls(1).await;
	token.cancel();
	let err = follower.await.unwrap_err();
	assert!(err.is_cancelled(), "got {err:?}");

	fx.parser.proceed();
	let record = leader.await.unwrap();
	assert!(record.parse_info().is_some());
	assert_eq!(fx.entry.current_version(), Some(VersionMarker::new(d, 1)));
}

#[tokio::test(flavor = "multi_thread")]
async fn non_owner_joiner_falls_back_to_own_parse() {
	let fx = Fixture::new();
	let d = doc();
	fx.entry.add_owner(project(1), false).unwrap();
	let outsider = project(7);

	let owner = fx.entry.parse_async(Some(&snapshot(d, 1, "x")), None, true, never());
	let joiner = fx.entry.parse_async(Some(&snapshot(d, 1, "x")), Some(&outsider), true, never());

	let (a, b) = tokio::join!(owner.wait(), joiner.wait());
	assert_eq!(a.unwrap().project_id(), Some(ProjectId(1)));
	assert_eq!(b.unwrap().project_id(), Some(ProjectId(7)));
}

#[tokio::test(flavor = "multi_thread")]
async fn deferred_content_is_read_in_background() {
	let fx = Fixture::with(TestParser::new(), StaticContent::on_disk("disk text"));
	fx.entry.add_owner(project(1), false).unwrap();

	let pending = fx.entry.parse_async(None, None, false, never());
	let file = pending.await.unwrap().parsed_file().cloned().unwrap();
	assert_eq!(file.text, "disk text");
	assert_eq!(fx.content.disk_reads.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn content_thread_resolves_open_document_eagerly() {
	let d = doc();
	let content = StaticContent {
		content_thread: true,
		..StaticContent::default()
	};
	*content.open.lock() = Some(snapshot(d, 2, "open"));
	let fx = Fixture::with(TestParser::new(), content);
	fx.entry.add_owner(project(1), false).unwrap();
	fx.entry.parse(None, None, true, &never()).unwrap();

	// The open document's version is known up front, so the cache answers.
	let pending = fx.entry.parse_async(None, None, true, never());
	assert!(pending.is_ready());
}

#[tokio::test(flavor = "multi_thread")]
async fn parser_failure_reaches_every_waiter() {
	let fx = Fixture::with(TestParser::held(), StaticContent::default());
	let d = doc();
	fx.entry.add_owner(project(1), false).unwrap();
	fx.parser.fail_for(Some(ProjectId(1)), Failure::Error);

	let a = fx.entry.parse_async(Some(&snapshot(d, 1, "x")), None, true, never());
	let b = fx.entry.parse_async(Some(&snapshot(d, 1, "x")), None, true, never());
	fx.parser.wait_for_calls(1).await;
	fx.parser.proceed();

	let (a, b) = tokio::join!(a.wait(), b.wait());
	assert!(matches!(a.unwrap_err(), Error::Parser { .. }));
	assert!(matches!(b.unwrap_err(), Error::Parser { .. }));
	assert_eq!(fx.parser.calls(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn panicking_parser_aborts_waiters_and_clears_tracking() {
	let fx = Fixture::new();
	let d = doc();
	fx.entry.add_owner(project(1), false).unwrap();
	fx.parser.fail_for(Some(ProjectId(1)), Failure::Panic);

	let err = fx.entry.parse_async(Some(&snapshot(d, 1, "x")), None, true, never()).await.unwrap_err();
	assert!(matches!(err, Error::Aborted { .. }), "got {err:?}");

	fx.parser.clear_failures();
	let retry = fx.entry.parse_async(Some(&snapshot(d, 1, "x")), None, true, never());
	assert!(!retry.is_joined());
	assert!(retry.await.unwrap().parse_info().is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn async_convenience_variants() {
	let fx = Fixture::new();
	let d = doc();
	fx.entry.add_owner(project(1), false).unwrap();

	let file = fx.entry.parse_file_async(Some(&snapshot(d, 1, "x")), None, never()).await.unwrap();
	assert!(file.is_some());
	let info = fx.entry.parse_information_async(Some(&snapshot(d, 1, "x")), None, never()).await.unwrap();
	assert!(info.unwrap().is_full());
	assert_eq!(fx.parser.calls(), 2);
}
