use common::{OrderStatus, PageRequest, UserId};

/// Builder for constructing order listing queries.
///
/// Allows filtering orders by owner and status, with offset/limit paging.
/// Results are always ordered newest first (id descending).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderQuery {
    /// Filter by owning user.
    pub user_id: Option<UserId>,

    /// Filter by status.
    pub status: Option<OrderStatus>,

    /// Maximum number of orders to return.
    pub limit: Option<u64>,

    /// Number of orders to skip.
    pub offset: Option<u64>,
}

impl OrderQuery {
    /// Creates a new query matching every order.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for the orders of a single user.
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            ..Default::default()
        }
    }

    /// Restricts the query to one status.
    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Applies a page window.
    pub fn page(mut self, page: PageRequest) -> Self {
        self.limit = Some(u64::from(page.limit()));
        self.offset = Some(page.offset());
        self
    }

    /// Returns true if `user_id` and `status` both match this query's filters.
    pub fn matches(&self, user_id: UserId, status: OrderStatus) -> bool {
        self.user_id.is_none_or(|u| u == user_id) && self.status.is_none_or(|s| s == status)
    }
}
