use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored vehicle record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub car_make: String,
    pub car_model: String,
    pub vin: String,
    pub manufactured_date: NaiveDate,
    pub age_of_vehicle: i32,
}

/// A validated candidate row, ready for bulk insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewVehicle {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub car_make: String,
    pub car_model: String,
    pub vin: String,
    pub manufactured_date: NaiveDate,
}

impl NewVehicle {
    /// Vehicle age in whole years, floored at 0 for future-dated records.
    pub fn age_of_vehicle(&self) -> i32 {
        let age = Utc::now().year() - self.manufactured_date.year();
        age.max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vehicle_made_in(year: i32) -> NewVehicle {
        NewVehicle {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            car_make: "Toyota".to_string(),
            car_model: "Corolla".to_string(),
            vin: "1HGBH41JXMN109186".to_string(),
            manufactured_date: NaiveDate::from_ymd_opt(year, 6, 1).unwrap(),
        }
    }

    #[test]
    fn test_age_of_vehicle() {
        let this_year = Utc::now().year();
        assert_eq!(vehicle_made_in(this_year).age_of_vehicle(), 0);
        assert_eq!(vehicle_made_in(this_year - 7).age_of_vehicle(), 7);
    }

    #[test]
    fn test_age_floored_at_zero() {
        let next_year = Utc::now().year() + 1;
        assert_eq!(vehicle_made_in(next_year).age_of_vehicle(), 0);
    }
}
