//! Classification of raw role strings into officer levels and categories.

use serde::Serialize;

use super::domain::PositionType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OfficerLevel {
    Junior,
    Assistant,
    Executive,
    CityEngineer,
    Clerk,
    Admin,
    User,
}

/// Result of classifying a role string. Junior and Assistant officers carry a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RoleClass {
    pub level: OfficerLevel,
    pub category: Option<PositionType>,
}

impl RoleClass {
    pub const fn new(level: OfficerLevel, category: Option<PositionType>) -> Self {
        Self { level, category }
    }

    /// Total over arbitrary input; anything unrecognized is a plain user.
    pub fn classify(role: &str) -> Self {
        let role = role.trim();
        match role {
            "ExecutiveEngineer" => return Self::new(OfficerLevel::Executive, None),
            "CityEngineer" => return Self::new(OfficerLevel::CityEngineer, None),
            "Clerk" => return Self::new(OfficerLevel::Clerk, None),
            "Admin" => return Self::new(OfficerLevel::Admin, None),
            _ => {}
        }

        let scoped = [
            ("Junior", OfficerLevel::Junior),
            ("Assistant", OfficerLevel::Assistant),
        ];
        for (prefix, level) in scoped {
            if let Some(suffix) = role.strip_prefix(prefix) {
                if let Some(category) = PositionType::ALL
                    .into_iter()
                    .find(|category| category.as_str() == suffix)
                {
                    return Self::new(level, Some(category));
                }
            }
        }

        Self::new(OfficerLevel::User, None)
    }

    /// Role string that classifies back to this value.
    pub fn role_name(&self) -> String {
        let category = self.category.map(PositionType::as_str).unwrap_or_default();
        match self.level {
            OfficerLevel::Junior => format!("Junior{category}"),
            OfficerLevel::Assistant => format!("Assistant{category}"),
            OfficerLevel::Executive => "ExecutiveEngineer".to_string(),
            OfficerLevel::CityEngineer => "CityEngineer".to_string(),
            OfficerLevel::Clerk => "Clerk".to_string(),
            OfficerLevel::Admin => "Admin".to_string(),
            OfficerLevel::User => "User".to_string(),
        }
    }

    pub fn is_officer(&self) -> bool {
        match self.level {
            OfficerLevel::Junior | OfficerLevel::Assistant => self.category.is_some(),
            OfficerLevel::Executive
            | OfficerLevel::CityEngineer
            | OfficerLevel::Clerk
            | OfficerLevel::Admin => true,
            OfficerLevel::User => false,
        }
    }

    /// Executive and City Engineers see every category at their stages.
    pub fn is_high_level(&self) -> bool {
        matches!(
            self.level,
            OfficerLevel::Executive | OfficerLevel::CityEngineer
        )
    }

    /// Title used in notification emails.
    pub fn display_name(&self) -> &'static str {
        use OfficerLevel::*;
        use PositionType::*;
        match (self.level, self.category) {
            (Junior, Some(Architect)) => "Junior Architect",
            (Junior, Some(StructuralEngineer)) => "Junior Structural Engineer",
            (Junior, Some(LicenceEngineer)) => "Junior Licence Engineer",
            (Junior, Some(Supervisor1)) => "Junior Supervisor (Category 1)",
            (Junior, Some(Supervisor2)) => "Junior Supervisor (Category 2)",
            (Assistant, Some(Architect)) => "Assistant Architect",
            (Assistant, Some(StructuralEngineer)) => "Assistant Structural Engineer",
            (Assistant, Some(LicenceEngineer)) => "Assistant Licence Engineer",
            (Assistant, Some(Supervisor1)) => "Assistant Supervisor (Category 1)",
            (Assistant, Some(Supervisor2)) => "Assistant Supervisor (Category 2)",
            (Executive, _) => "Executive Engineer",
            (CityEngineer, _) => "City Engineer",
            (Clerk, _) => "Administrative Officer",
            _ => "PMC Officer",
        }
    }

    /// Where this officer's signature lands on the recommended form.
    pub fn signature_placement(&self) -> SignaturePlacement {
        match self.level {
            OfficerLevel::Junior => SignaturePlacement::JUNIOR,
            OfficerLevel::Assistant => SignaturePlacement::ASSISTANT,
            OfficerLevel::Executive => SignaturePlacement::EXECUTIVE,
            OfficerLevel::CityEngineer => SignaturePlacement::CITY_ENGINEER,
            OfficerLevel::Clerk | OfficerLevel::Admin | OfficerLevel::User => {
                SignaturePlacement::JUNIOR
            }
        }
    }
}

/// Rectangle on the last page of the recommended form, as `x1,y1,x2,y2` in PDF points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignaturePlacement {
    pub x1: u16,
    pub y1: u16,
    pub x2: u16,
    pub y2: u16,
}

impl SignaturePlacement {
    pub const JUNIOR: Self = Self::new(117, 383, 236, 324);
    pub const ASSISTANT: Self = Self::new(300, 383, 419, 324);
    pub const EXECUTIVE: Self = Self::new(117, 300, 236, 241);
    pub const CITY_ENGINEER: Self = Self::new(300, 300, 419, 241);

    const fn new(x1: u16, y1: u16, x2: u16, y2: u16) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn coordinates(&self) -> String {
        format!("{},{},{},{}", self.x1, self.y1, self.x2, self.y2)
    }
}
