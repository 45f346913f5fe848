//! End-to-end flows across component boundaries. Every external system
//! (L1 node, consensus chain, gossip peers) is an in-process mock.

pub mod fixtures;

mod decryption;
mod eon_dkg;
mod keyper_flow;
mod keyper_sets;
