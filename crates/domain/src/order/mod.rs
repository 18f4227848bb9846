//! Order records, request value objects and status enums.

mod model;
mod state;
mod value_objects;

pub use model::{NewOrder, NewOrderItem, Order, OrderItem, OrderItemDetail, OrderWithItems};
pub use state::{OrderStatus, PaymentStatus};
pub use value_objects::{CreateOrderRequest, OrderLineRequest, ShippingAddress};
