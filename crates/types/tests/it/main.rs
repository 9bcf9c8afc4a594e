mod identity_tests;
mod signature_tests;
mod version_tests;
