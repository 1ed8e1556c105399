/// Rejects the transaction if the condition holds, logging the reason.
macro_rules! reject_if {
    ($cond:expr, $err:expr) => {
        if $cond {
            reject!($err);
        }
    };
}

/// Rejects the transaction with the provided [`RejectionError`], logging the
/// reason.
///
/// [`RejectionError`]: crate::RejectionError
macro_rules! reject {
    ($err:expr) => {{
        let reason: $crate::RejectionError = $err;
        ::tracing::debug!(%reason, "rejecting transaction");
        return Err(reason.into());
    }};
}
