use std::future::Future;

use tokio::task::LocalSet;

pub fn start_test(f: impl Future<Output = ()>) {
    tokio_test::block_on(async move {
        bluetooth_privacy::load_config(vec!["log_level=debug".to_string()]);
        LocalSet::new().run_until(f).await;
    });
}
