use anyhow::Result;

/// Every engine mutation happens on one thread, so the companion only ever needs this runtime.
pub fn single_thread_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}
