/// Waits for the next tick of a ticker and checks its height.
///
/// ```ignore
/// assert_next_tick!(ticker, 10);
/// assert_next_tick!(ticker, 19, truncated = true);
/// ```
#[macro_export]
macro_rules! assert_next_tick {
    ($ticker: expr, $height: expr) => {
        $crate::assert_next_tick!($ticker, $height, truncated = false)
    };
    ($ticker: expr, $height: expr, truncated = $truncated: expr) => {{
        let tick = tokio::time::timeout(std::time::Duration::from_secs(5), $ticker.wait())
            .await
            .expect("timed out")
            .expect("tick request was dropped");
        assert_eq!(tick.height, $height, "unexpected tick height: {:?}", tick);
        assert_eq!(tick.truncated, $truncated, "unexpected truncation: {:?}", tick);
        tick
    }};
}

/// Asserts that a pending tick receiver stays empty for the given duration.
///
/// The receiver is borrowed, so it can still be awaited afterwards.
#[macro_export]
macro_rules! assert_no_tick {
    ($receiver: expr, within = $duration: expr) => {
        if let Ok(result) = tokio::time::timeout($duration, &mut $receiver).await {
            panic!("Expected no tick, got {:?}", result);
        }
    };
}

/// Waits for the next log of a subscription stream and compares it with `expected`.
#[macro_export]
macro_rules! assert_next_log {
    ($stream: expr, $expected: expr) => {
        $crate::assert_next_log!($stream, $expected, timeout = 5)
    };
    ($stream: expr, $expected: expr, timeout = $secs: expr) => {
        let message = tokio::time::timeout(
            std::time::Duration::from_secs($secs),
            tokio_stream::StreamExt::next(&mut $stream),
        )
        .await
        .expect("timed out");
        let expected = $expected;
        match message {
            std::option::Option::Some(log) => {
                assert_eq!(log, expected, "Expected {:?}, got {:?}", expected, log);
            }
            std::option::Option::None => {
                panic!("Expected {:?}, but stream was closed", expected);
            }
        }
    };
}

/// Asserts that a stream ends.
#[macro_export]
macro_rules! assert_closed {
    ($stream: expr) => {
        $crate::assert_closed!($stream, timeout = 5)
    };
    ($stream: expr, timeout = $secs: expr) => {
        let message = tokio::time::timeout(
            std::time::Duration::from_secs($secs),
            tokio_stream::StreamExt::next(&mut $stream),
        )
        .await
        .expect("timed out");
        assert!(message.is_none(), "Expected closed stream, got {:?}", message)
    };
}

/// Asserts that a stream yields nothing, neither an item nor its end, for the given duration.
#[macro_export]
macro_rules! assert_no_log {
    ($stream: expr, within = $duration: expr) => {
        if let Ok(message) =
            tokio::time::timeout($duration, tokio_stream::StreamExt::next(&mut $stream)).await
        {
            panic!("Expected no log, got {:?}", message);
        }
    };
}
