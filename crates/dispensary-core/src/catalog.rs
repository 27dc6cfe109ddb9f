use serde::{Deserialize, Serialize};

use crate::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductCategory {
    Flower,
    Edibles,
    Concentrates,
    Tinctures,
    Topicals,
    Accessories,
}

impl ProductCategory {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProductCategory::Flower => "flower",
            ProductCategory::Edibles => "edibles",
            ProductCategory::Concentrates => "concentrates",
            ProductCategory::Tinctures => "tinctures",
            ProductCategory::Topicals => "topicals",
            ProductCategory::Accessories => "accessories",
        }
    }
}

impl std::fmt::Display for ProductCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProductCategory {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "flower" => Ok(ProductCategory::Flower),
            "edibles" => Ok(ProductCategory::Edibles),
            "concentrates" => Ok(ProductCategory::Concentrates),
            "tinctures" => Ok(ProductCategory::Tinctures),
            "topicals" => Ok(ProductCategory::Topicals),
            "accessories" => Ok(ProductCategory::Accessories),
            other => Err(CoreError::InvalidValue {
                field: "category",
                value: other.to_string(),
            }),
        }
    }
}
