use std::{rc::Rc, thread};

use bluetooth_privacy::{
    core::irk::Irk,
    privacy::{
        config::PrivacyConfig,
        mocks::mock_controller::{MockController, MockControllerEvent},
        module::{PrivacyHandle, PrivacyModule},
        resolving_list::ResolvingListEntry,
        PrivacyManager,
    },
};
use tokio::task::spawn_local;
use utils::start_test;

mod utils;

fn start_module(config: PrivacyConfig) -> (PrivacyHandle, MockController) {
    let mock = MockController::new();
    let manager = PrivacyManager::new(
        config,
        Rc::new(mock.clone()),
        Rc::new(mock.clone()),
        Rc::new(mock.clone()),
    );
    let (module, handle) = PrivacyModule::new(manager);
    spawn_local(module.run());
    (handle, mock)
}

#[test]
fn test_start_through_handle() {
    start_test(async {
        // arrange
        let (handle, mock) = start_module(PrivacyConfig::default());

        // act
        let res = handle.call(|manager| manager.start()).await.unwrap();

        // assert
        assert_eq!(res, Ok(()));
        assert_eq!(mock.rpa_timeout(), Some(300));
        assert_eq!(mock.resolving_list(), vec![ResolvingListEntry::self_entry(Irk::DEFAULT)]);
    });
}

#[test]
fn test_posts_from_other_threads_do_not_interleave() {
    start_test(async {
        // arrange
        let (handle, mock) = start_module(PrivacyConfig::default());
        handle.call(|manager| manager.start()).await.unwrap().unwrap();
        mock.clear_events();

        // act: bond four peers from two foreign threads
        let workers: Vec<_> = (0..2u8)
            .map(|worker| {
                let handle = handle.clone();
                thread::spawn(move || {
                    for i in 0..2u8 {
                        let address = [worker, i, 0, 0, 0, 0xc0];
                        handle
                            .post(move |manager| {
                                manager.add_device(0x01, address, Irk([i; 16])).unwrap()
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        // flush everything posted so far
        handle.call(|_| ()).await.unwrap();

        // assert: every add sits in its own preemption bracket
        let events = mock.events();
        assert_eq!(events.len(), 4 * 4);
        for bracket in events.chunks(4) {
            assert_eq!(bracket[0], MockControllerEvent::Preempt);
            assert!(matches!(bracket[1], MockControllerEvent::Command(_)));
            assert!(matches!(bracket[2], MockControllerEvent::Command(_)));
            assert_eq!(bracket[3], MockControllerEvent::Resume);
        }
        assert_eq!(mock.resolving_list().len(), 5);
    });
}

#[test]
fn test_call_fails_once_module_stops() {
    start_test(async {
        // arrange
        let mock = MockController::new();
        let manager = PrivacyManager::new(
            PrivacyConfig::default(),
            Rc::new(mock.clone()),
            Rc::new(mock.clone()),
            Rc::new(mock.clone()),
        );
        let (module, handle) = PrivacyModule::new(manager);

        // act
        drop(module);

        // assert
        assert!(handle.call(|manager| manager.is_started()).await.is_err());
    });
}
