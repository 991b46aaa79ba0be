//! Mocked collaborators of the privacy module, for use in test

pub mod mock_controller;
