//! Fixed product table consulted by the price tools.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub price: f64,
}

impl Product {
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
        }
    }

    /// The store's stock catalog.
    pub fn defaults() -> Vec<Product> {
        vec![
            Product::new("1", "Laptop", 1000.0),
            Product::new("2", "Smartphone", 500.0),
            Product::new("3", "Tablet", 300.0),
        ]
    }
}

/// Immutable, ordered product lookup table.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductTable {
    products: Vec<Product>,
}

impl ProductTable {
    pub fn new(products: Vec<Product>) -> Self {
        Self { products }
    }

    /// Find a product by id
    pub fn find(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Product> {
        self.products.iter()
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// "- Laptop -> ID: "1", Price: $1000.0" lines used in tool descriptions
    pub fn mapping_lines(&self) -> String {
        self.products
            .iter()
            .map(|p| format!("- {} -> ID: \"{}\", Price: ${:.1}", p.name, p.id, p.price))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for ProductTable {
    fn default() -> Self {
        Self::new(Product::defaults())
    }
}
