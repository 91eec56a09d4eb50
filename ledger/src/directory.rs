//! Static directory of configured accounts.
//!
//! Built once at startup from already-parsed configuration; read-only
//! afterwards, so concurrent lookups need no synchronization.

use std::collections::HashMap;
use std::fmt;

use corebank_common::{AccountRef, BankError, Currency, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Purpose of a configured account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    /// End-customer account.
    Customer,
    /// Per-currency holding account for in-flight debits.
    Hold,
    /// Per-currency settlement account.
    Settlement,
    /// Per-currency FX intermediary account.
    Fx,
    /// Per-currency sentinel account that forces transfer failure.
    Reject,
}

impl AccountKind {
    /// Category kinds that get one account per currency.
    pub const CATEGORIES: [AccountKind; 4] = [
        AccountKind::Hold,
        AccountKind::Settlement,
        AccountKind::Fx,
        AccountKind::Reject,
    ];

    /// Get the kind name.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountKind::Customer => "customer",
            AccountKind::Hold => "hold",
            AccountKind::Settlement => "settlement",
            AccountKind::Fx => "fx",
            AccountKind::Reject => "reject",
        }
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Postal address of an account holder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostalAddress {
    #[serde(default)]
    pub house: Option<String>,
    pub street: String,
    pub city: String,
    pub post_code: String,
    /// ISO 3166-1 alpha-2 country code.
    pub country: String,
}

/// A configured account: identity, display data, currency, and the opening
/// balance the ledger is seeded with. Immutable after load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountDescriptor {
    /// Account legal name.
    pub name: String,
    /// Physical address, where known.
    pub address: Option<PostalAddress>,
    /// Routing identity.
    pub reference: AccountRef,
    /// Account currency.
    pub currency: Currency,
    /// Account purpose.
    pub kind: AccountKind,
    /// Balance the account starts with.
    pub opening_balance: Decimal,
}

/// Configuration for one customer account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerAccountConfig {
    pub name: String,
    #[serde(default)]
    pub address: Option<PostalAddress>,
    pub bic: String,
    pub number: String,
    pub currency: String,
    pub balance: Decimal,
}

/// Template for the per-currency category accounts. The account number is
/// derived by substituting the currency code into `number_format`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryTemplate {
    pub bic: String,
    /// Number pattern containing a `{currency}` placeholder.
    pub number_format: String,
    #[serde(default)]
    pub balance: Decimal,
}

impl CategoryTemplate {
    /// Derive the account reference for a currency.
    pub fn reference_for(&self, currency: &Currency) -> AccountRef {
        AccountRef::new(
            &self.bic,
            self.number_format.replace("{currency}", currency.code()),
        )
    }
}

/// Directory configuration: customer accounts plus one category-account
/// template per special purpose.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    pub customers: Vec<CustomerAccountConfig>,
    pub hold: CategoryTemplate,
    pub settlement: CategoryTemplate,
    pub fx: CategoryTemplate,
    pub reject: CategoryTemplate,
    /// Currencies to provision category accounts for, in addition to every
    /// currency a customer account is denominated in.
    #[serde(default)]
    pub currencies: Vec<String>,
}

/// Read-mostly index of all configured accounts.
#[derive(Debug)]
pub struct AccountDirectory {
    by_ref: HashMap<AccountRef, AccountDescriptor>,
    categories: HashMap<(AccountKind, Currency), AccountRef>,
    templates: HashMap<AccountKind, CategoryTemplate>,
}

impl AccountDirectory {
    /// Build the directory from configuration. Fails on duplicate account
    /// references or category templates whose numbers collide.
    pub fn from_config(config: DirectoryConfig) -> Result<Self> {
        let mut by_ref = HashMap::new();
        let mut categories = HashMap::new();

        let mut currencies: Vec<Currency> = config
            .currencies
            .iter()
            .map(|c| Currency::new(c.as_str()))
            .collect();
        for customer in &config.customers {
            let currency = Currency::new(customer.currency.as_str());
            if !currencies.contains(&currency) {
                currencies.push(currency);
            }
        }

        for customer in config.customers {
            let descriptor = AccountDescriptor {
                name: customer.name,
                address: customer.address,
                reference: AccountRef::new(&customer.bic, &customer.number),
                currency: Currency::new(customer.currency.as_str()),
                kind: AccountKind::Customer,
                opening_balance: customer.balance,
            };
            insert_unique(&mut by_ref, descriptor)?;
        }

        let templates: HashMap<AccountKind, CategoryTemplate> = [
            (AccountKind::Hold, config.hold),
            (AccountKind::Settlement, config.settlement),
            (AccountKind::Fx, config.fx),
            (AccountKind::Reject, config.reject),
        ]
        .into_iter()
        .collect();

        for currency in &currencies {
            for kind in AccountKind::CATEGORIES {
                let template = &templates[&kind];
                let reference = template.reference_for(currency);
                let descriptor = AccountDescriptor {
                    name: format!("{} account - {}", kind, currency),
                    address: None,
                    reference: reference.clone(),
                    currency: currency.clone(),
                    kind,
                    opening_balance: template.balance,
                };
                insert_unique(&mut by_ref, descriptor)?;
                categories.insert((kind, currency.clone()), reference);
            }
        }

        Ok(Self {
            by_ref,
            categories,
            templates,
        })
    }

    /// Look up an account by its reference.
    pub fn lookup(&self, reference: &AccountRef) -> Option<&AccountDescriptor> {
        self.by_ref.get(reference)
    }

    /// Get the category account of the given kind for a currency. Fails with
    /// `AccountNotFound` when no account is provisioned for that currency.
    pub fn category_account(
        &self,
        kind: AccountKind,
        currency: &Currency,
    ) -> Result<&AccountDescriptor> {
        let reference = self
            .categories
            .get(&(kind, currency.clone()))
            .ok_or_else(|| BankError::AccountNotFound(self.templates[&kind].reference_for(currency)))?;
        Ok(&self.by_ref[reference])
    }

    /// Check whether the account is the reject account for its currency.
    pub fn is_reject(&self, reference: &AccountRef) -> bool {
        self.lookup(reference)
            .map(|a| a.kind == AccountKind::Reject)
            .unwrap_or(false)
    }

    /// Iterate over all configured accounts.
    pub fn all(&self) -> impl Iterator<Item = &AccountDescriptor> {
        self.by_ref.values()
    }
}

fn insert_unique(
    by_ref: &mut HashMap<AccountRef, AccountDescriptor>,
    descriptor: AccountDescriptor,
) -> Result<()> {
    let reference = descriptor.reference.clone();
    if by_ref.insert(reference.clone(), descriptor).is_some() {
        return Err(BankError::Configuration(format!(
            "duplicate account reference {}",
            reference
        )));
    }
    Ok(())
}

/// Shared fixture: customer accounts in EUR and USD plus category templates.
#[cfg(test)]
pub(crate) fn test_config() -> DirectoryConfig {
    serde_json::from_value(serde_json::json!({
        "customers": [
            {
                "name": "Alice Chandler",
                "address": {
                    "house": "12",
                    "street": "Main St",
                    "city": "Dublin",
                    "post_code": "D01",
                    "country": "IE"
                },
                "bic": "IRONBANK44",
                "number": "1000001",
                "currency": "EUR",
                "balance": "1000.00"
            },
            {
                "name": "Bob Osei",
                "bic": "IRONBANK44",
                "number": "1000002",
                "currency": "USD",
                "balance": "250.00"
            },
            {
                "name": "Carol Novak",
                "bic": "IRONBANK44",
                "number": "1000003",
                "currency": "EUR",
                "balance": "500.00"
            }
        ],
        "hold": { "bic": "IRONBANK44", "number_format": "hold-{currency}" },
        "settlement": { "bic": "IRONBANK44", "number_format": "settle-{currency}" },
        "fx": { "bic": "IRONBANK44", "number_format": "fx-{currency}", "balance": "1000000" },
        "reject": { "bic": "IRONBANK44", "number_format": "reject-{currency}" }
    }))
    .unwrap()
}
