//! Address book.

use tracing::instrument;

use crate::error::{ShopError, ShopResult};
use crate::models::{Address, AddressInput};
use crate::store::ShopStore;
use crate::types::{AddressId, UserId};

/// Policy limit, checked when creating an address.
pub const MAX_ADDRESSES_PER_USER: i64 = 5;

pub struct AddressBook<'a, S> {
    store: &'a S,
}

impl<'a, S: ShopStore> AddressBook<'a, S> {
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Default address first, then newest.
    ///
    /// # Errors
    ///
    /// Store failures only.
    pub async fn list(&self, user_id: UserId) -> ShopResult<Vec<Address>> {
        Ok(self.store.addresses(user_id).await?)
    }

    /// # Errors
    ///
    /// `NotFound` if the address is not the user's.
    pub async fn get(&self, user_id: UserId, id: AddressId) -> ShopResult<Address> {
        self.store
            .address(user_id, id)
            .await?
            .ok_or_else(|| ShopError::not_found("Address"))
    }

    /// # Errors
    ///
    /// `Validation` for invalid fields or when the user already has
    /// [`MAX_ADDRESSES_PER_USER`] addresses.
    #[instrument(skip(self, input))]
    pub async fn create(&self, user_id: UserId, input: AddressInput) -> ShopResult<Address> {
        let input = validated(input)?;
        if self.store.count_addresses(user_id).await? >= MAX_ADDRESSES_PER_USER {
            return Err(ShopError::Validation(format!(
                "Maximum {MAX_ADDRESSES_PER_USER} addresses allowed"
            )));
        }
        let address = self.store.create_address(user_id, &input).await?;
        tracing::info!(address_id = %address.id, is_default = address.is_default, "Address created");
        Ok(address)
    }

    /// # Errors
    ///
    /// `Validation` for invalid fields, `NotFound` if the address is not the
    /// user's.
    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        user_id: UserId,
        id: AddressId,
        input: AddressInput,
    ) -> ShopResult<Address> {
        let input = validated(input)?;
        self.store
            .update_address(user_id, id, &input)
            .await?
            .ok_or_else(|| ShopError::not_found("Address"))
    }

    /// Deleting the default leaves the user without one.
    ///
    /// # Errors
    ///
    /// `NotFound` if the address is not the user's.
    #[instrument(skip(self))]
    pub async fn delete(&self, user_id: UserId, id: AddressId) -> ShopResult<()> {
        if self.store.delete_address(user_id, id).await? {
            Ok(())
        } else {
            Err(ShopError::not_found("Address"))
        }
    }

    /// # Errors
    ///
    /// `NotFound` if the address is not the user's; the previous default is
    /// kept in that case.
    #[instrument(skip(self))]
    pub async fn set_default(&self, user_id: UserId, id: AddressId) -> ShopResult<Address> {
        self.store
            .set_default_address(user_id, id)
            .await?
            .ok_or_else(|| ShopError::not_found("Address"))
    }
}

fn validated(input: AddressInput) -> ShopResult<AddressInput> {
    let input = input.normalized();
    input
        .validate()
        .map_err(|errors| ShopError::Validation(errors.join("; ")))?;
    Ok(input)
}
