//! Type-erased future/stream aliases, the `std`-targeted equivalent of
//! `spark-core::future`'s `no_std` boxed-future aliases.

use std::future::Future;
use std::pin::Pin;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type LocalBoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;
