//! Shared fixtures for dispatch integration tests

#![allow(dead_code)]

pub mod mock_server;
