//! The router collaborator: identity, intro vetting, and message handling.

use veil_crypto::x25519::PrivateKey;

use crate::contact::{IdentityKey, RouterContact};
use crate::messages::LinkIntro;

/// What the link layer needs from the router it serves.
///
/// All calls happen on the link thread; implementations that need to do
/// real work should post a job to the logic thread and return.
pub trait Router {
    /// Our signed router contact, sent in outbound link intros.
    fn contact(&self) -> &RouterContact;

    /// Our long-term encryption secret, the initiator side of the
    /// handshake DH. Its public half is the `enckey` in our contact.
    fn encryption_secret(&self) -> &PrivateKey;

    /// Vet a received link intro. A `false` verdict aborts session
    /// establishment. Implementations should at minimum verify the
    /// contact signature.
    fn handle_intro(&mut self, intro: &LinkIntro) -> bool;

    /// One reassembled link message from an established session. A
    /// `false` verdict closes the session.
    fn handle_link_message(&mut self, from: &IdentityKey, msg: &[u8]) -> bool;

    /// A session reached the ready state. Called exactly once per
    /// session, at the moment it is registered under its pubkey.
    fn handle_session_established(&mut self, rc: &RouterContact);
}
