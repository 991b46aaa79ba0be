//! The event loop that owns a PrivacyManager. Every operation runs on this
//! loop to completion before the next is started, so callers on other tasks
//! or threads never interleave commands on the controller.

use anyhow::{anyhow, Result};
use log::{info, warn};
use tokio::sync::{mpsc, oneshot};

use super::PrivacyManager;

type BoxedPrivacyCallback = Box<dyn FnOnce(&mut PrivacyManager) + Send + 'static>;

/// Owns the PrivacyManager and runs posted callbacks against it
pub struct PrivacyModule {
    manager: PrivacyManager,
    rx: mpsc::UnboundedReceiver<BoxedPrivacyCallback>,
}

/// The TX end of a channel into the privacy module. Cheap to clone.
#[derive(Clone)]
pub struct PrivacyHandle(mpsc::UnboundedSender<BoxedPrivacyCallback>);

impl PrivacyModule {
    /// Constructor. Nothing runs until run() is awaited.
    pub fn new(manager: PrivacyManager) -> (Self, PrivacyHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { manager, rx }, PrivacyHandle(tx))
    }

    /// Process posted callbacks in order until every PrivacyHandle is
    /// dropped, then give back the manager
    pub async fn run(mut self) -> PrivacyManager {
        info!("starting privacy module event loop");
        while let Some(f) = self.rx.recv().await {
            f(&mut self.manager)
        }
        warn!("privacy module queue has stopped");
        self.manager
    }
}

impl PrivacyHandle {
    /// Posts a callback to the privacy module, without waiting for it to run
    pub fn post<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut PrivacyManager) + Send + 'static,
    {
        self.0.send(Box::new(f)).map_err(|_| anyhow!("privacy module has stopped"))
    }

    /// Runs a callback on the privacy module and returns its result
    pub async fn call<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PrivacyManager) -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.post(move |manager| {
            // the caller may have gone away, in which case nobody wants the result
            let _ = tx.send(f(manager));
        })?;
        rx.await.map_err(|_| anyhow!("privacy module stopped before running the call"))
    }
}

#[cfg(test)]
mod test {
    use std::rc::Rc;

    use tokio::task::{spawn_local, LocalSet};

    use crate::{
        core::irk::Irk,
        privacy::{config::PrivacyConfig, mocks::mock_controller::MockController},
    };

    use super::*;

    fn new_module() -> (PrivacyModule, PrivacyHandle, MockController) {
        let mock = MockController::new();
        let manager = PrivacyManager::new(
            PrivacyConfig::default(),
            Rc::new(mock.clone()),
            Rc::new(mock.clone()),
            Rc::new(mock.clone()),
        );
        let (module, handle) = PrivacyModule::new(manager);
        (module, handle, mock)
    }

    #[test]
    fn test_call_returns_result() {
        tokio_test::block_on(LocalSet::new().run_until(async {
            // arrange
            let (module, handle, _mock) = new_module();
            spawn_local(module.run());

            // act
            let irk = handle
                .call(|manager| {
                    manager.set_local_irk(Some(Irk([7; 16]))).unwrap();
                    manager.read_local_irk()
                })
                .await
                .unwrap();

            // assert
            assert_eq!(irk, Irk([7; 16]));
        }));
    }

    #[test]
    fn test_run_returns_manager_once_handles_drop() {
        tokio_test::block_on(LocalSet::new().run_until(async {
            // arrange
            let (module, handle, mock) = new_module();
            let running = spawn_local(module.run());

            // act
            handle.post(|manager| manager.ensure_started().unwrap()).unwrap();
            drop(handle);
            let manager = running.await.unwrap();

            // assert
            assert!(manager.is_started());
            assert_eq!(mock.rpa_timeout(), Some(300));
        }));
    }

    #[test]
    fn test_post_fails_after_stop() {
        let (module, handle, _mock) = new_module();
        drop(module);

        assert!(handle.post(|manager| manager.reset()).is_err());
    }
}
