mod client_tests;
mod peer_tests;
