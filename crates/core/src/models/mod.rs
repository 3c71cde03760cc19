//! Domain records read and written by the stores.

pub mod address;
pub mod cart;
pub mod catalog;
pub mod order;
pub mod payment;
pub mod settings;

pub use address::{Address, AddressInput};
pub use cart::{Cart, CartItem, CartLine, CartView, GuestCartLine, MergeError, MergeReport};
pub use catalog::{Category, Product, ProductQuery, ProductSort};
pub use order::{AdminOrderView, NewOrder, NewOrderItem, Order, OrderDetails, OrderItem, OrderStatusRow};
pub use payment::{NewTransaction, StatusChange, StockAdjustment, Transaction};
pub use settings::Setting;
