//! Atelier server library.
//!
//! This crate provides the order brokering service as a library, allowing
//! the engines to be exercised from the integration-tests crate with fake
//! collaborators.
//!
//! # Architecture
//!
//! Inbound requests are resolved to an [`atelier_core::Actor`] by the
//! authentication layer in front of this service, then dispatched to one of
//! two engines:
//!
//! - [`services::OrderService`] - owns the order status state machine and
//!   the chat-closure gate
//! - [`services::ChatService`] - owns message append and room closure
//!
//! Both engines authorize through the single shared policy in
//! `atelier-core`, talk to Postgres through the gateway traits in
//! [`gateway`], and enqueue notification jobs on the durable queue in
//! [`notifications`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod middleware;
pub mod models;
pub mod notifications;
pub mod routes;
pub mod services;
pub mod state;
