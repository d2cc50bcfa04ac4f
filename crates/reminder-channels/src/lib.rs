//! # Reminder Channels
//!
//! Outbound message providers implementing
//! [`MessageGateway`](reminder_core::traits::MessageGateway).

pub mod whatsapp;

pub use whatsapp::WhatsAppGateway;
