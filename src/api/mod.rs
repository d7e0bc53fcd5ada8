//! Backend resources. Each module adds thin `ApiClient` methods over
//! `ApiClient::request`; none of them interpret status codes.

mod auth;
mod cart;
mod orders;
mod payments;
mod products;
mod shipments;
mod users;
