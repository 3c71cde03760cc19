//! Cart engine.

use tracing::instrument;

use crate::error::{ErrorKind, ShopError, ShopResult};
use crate::models::{Cart, CartItem, CartView, GuestCartLine, MergeError, MergeReport};
use crate::pricing::compute_totals;
use crate::services::SettingsService;
use crate::store::ShopStore;
use crate::types::{CartId, ProductId, UserId};

pub struct CartService<'a, S> {
    store: &'a S,
}

impl<'a, S: ShopStore> CartService<'a, S> {
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// # Errors
    ///
    /// Store failures only.
    pub async fn get_or_create_cart(&self, user_id: UserId) -> ShopResult<Cart> {
        Ok(self.store.get_or_create_cart(user_id).await?)
    }

    /// Add `quantity` of a product, incrementing an existing line.
    ///
    /// The stock check is cumulative: the line's existing quantity counts
    /// against stock. On any error the cart is unchanged.
    ///
    /// # Errors
    ///
    /// `Validation` for non-positive quantities, `NotFound` for unknown
    /// products, `OutOfStock` when stock is zero and `InsufficientStock`
    /// when the resulting line would exceed stock.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: i32,
    ) -> ShopResult<CartItem> {
        if quantity < 1 {
            return Err(ShopError::Validation(
                "Quantity must be at least 1".to_owned(),
            ));
        }

        let product = self
            .store
            .product(product_id)
            .await?
            .ok_or_else(|| ShopError::not_found("Product"))?;
        if product.stock <= 0 {
            return Err(ShopError::OutOfStock);
        }

        let in_cart = self.quantity_in_cart(cart_id, product_id).await?;
        if in_cart.saturating_add(quantity) > product.stock {
            return Err(ShopError::InsufficientStock {
                available: product.stock,
                in_cart,
            });
        }

        // The write re-checks the ceiling, so a concurrent add for the same
        // line cannot push it past stock.
        if let Some(item) = self
            .store
            .add_item_within(cart_id, product_id, quantity, product.stock)
            .await?
        {
            return Ok(item);
        }

        let in_cart = self.quantity_in_cart(cart_id, product_id).await?;
        Err(ShopError::InsufficientStock {
            available: product.stock,
            in_cart,
        })
    }

    /// Set a line's quantity. Zero is a validation error, not a remove.
    ///
    /// # Errors
    ///
    /// `Validation` for quantities below 1, `InsufficientStock` above stock
    /// and `NotFound` if the product is not in the cart.
    #[instrument(skip(self))]
    pub async fn update_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: i32,
    ) -> ShopResult<CartItem> {
        if quantity < 1 {
            return Err(ShopError::Validation(
                "Quantity must be at least 1".to_owned(),
            ));
        }

        let product = self
            .store
            .product(product_id)
            .await?
            .ok_or_else(Self::item_not_found)?;
        if quantity > product.stock {
            return Err(ShopError::InsufficientStock {
                available: product.stock,
                in_cart: 0,
            });
        }

        self.store
            .set_item_quantity(cart_id, product_id, quantity)
            .await?
            .ok_or_else(Self::item_not_found)
    }

    /// # Errors
    ///
    /// `NotFound` if the product is not in the cart.
    #[instrument(skip(self))]
    pub async fn remove_item(&self, cart_id: CartId, product_id: ProductId) -> ShopResult<()> {
        if self.store.remove_item(cart_id, product_id).await? {
            Ok(())
        } else {
            Err(Self::item_not_found())
        }
    }

    /// Remove every line. A no-op on an empty cart.
    ///
    /// # Errors
    ///
    /// Store failures only.
    #[instrument(skip(self))]
    pub async fn clear(&self, cart_id: CartId) -> ShopResult<()> {
        let removed = self.store.clear_cart(cart_id).await?;
        tracing::debug!(removed, "Cart cleared");
        Ok(())
    }

    /// The buyer's cart with live prices and totals from a fresh settings
    /// snapshot.
    ///
    /// # Errors
    ///
    /// Store failures only.
    pub async fn view(&self, user_id: UserId) -> ShopResult<CartView> {
        let cart = self.get_or_create_cart(user_id).await?;
        let items = self.store.cart_lines(cart.id).await?;
        let pricing = SettingsService::new(self.store).pricing().await?;
        let totals = compute_totals(items.iter().map(|l| (l.unit_price, l.quantity)), &pricing);
        Ok(CartView {
            cart,
            items,
            totals,
        })
    }

    /// Merge a client-side guest cart into the buyer's server cart.
    ///
    /// Each line goes through [`Self::add_item`], so guest quantities stack
    /// on top of what the server cart already holds under the same stock
    /// ceiling. A failing line is reported and the merge moves on.
    ///
    /// # Errors
    ///
    /// Only if the server cart itself cannot be loaded.
    #[instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn merge_guest_cart(
        &self,
        user_id: UserId,
        lines: &[GuestCartLine],
    ) -> ShopResult<MergeReport> {
        let cart = self.get_or_create_cart(user_id).await?;
        let mut report = MergeReport::default();

        for line in lines {
            match self.add_item(cart.id, line.product_id, line.quantity).await {
                Ok(_) => report.merged_count += 1,
                Err(e) => {
                    let error = if e.kind() == ErrorKind::Internal {
                        tracing::error!(product_id = %line.product_id, error = %e, "Guest cart line failed to merge");
                        "Could not add item to cart".to_owned()
                    } else {
                        e.to_string()
                    };
                    report.errors.push(MergeError {
                        product_id: line.product_id,
                        error,
                    });
                }
            }
        }

        tracing::info!(
            merged = report.merged_count,
            failed = report.errors.len(),
            "Guest cart merged"
        );
        Ok(report)
    }

    async fn quantity_in_cart(&self, cart_id: CartId, product_id: ProductId) -> ShopResult<i32> {
        Ok(self
            .store
            .cart_item(cart_id, product_id)
            .await?
            .map_or(0, |item| item.quantity))
    }

    fn item_not_found() -> ShopError {
        ShopError::NotFound("Item not found in cart".to_owned())
    }
}
