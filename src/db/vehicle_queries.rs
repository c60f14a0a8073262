use chrono::{Datelike, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, QueryBuilder, Row};

use crate::models::vehicle::{NewVehicle, Vehicle};

fn row_to_vehicle(row: &PgRow) -> Result<Vehicle, sqlx::Error> {
    Ok(Vehicle {
        id: row.try_get("id")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        email: row.try_get("email")?,
        car_make: row.try_get("car_make")?,
        car_model: row.try_get("car_model")?,
        vin: row.try_get("vin")?,
        manufactured_date: row.try_get("manufactured_date")?,
        age_of_vehicle: row.try_get("age_of_vehicle")?,
    })
}

/// Insert a batch of validated vehicles in a single statement.
///
/// The whole batch is submitted at once: a unique-constraint violation on
/// any row fails the entire call, so the caller observes the write as
/// all-or-nothing.
pub async fn bulk_insert(pool: &PgPool, vehicles: &[NewVehicle]) -> Result<u64, sqlx::Error> {
    if vehicles.is_empty() {
        return Ok(0);
    }

    let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
        "INSERT INTO vehicles \
         (first_name, last_name, email, car_make, car_model, vin, manufactured_date, age_of_vehicle) ",
    );

    builder.push_values(vehicles, |mut b, v| {
        b.push_bind(&v.first_name)
            .push_bind(&v.last_name)
            .push_bind(&v.email)
            .push_bind(&v.car_make)
            .push_bind(&v.car_model)
            .push_bind(&v.vin)
            .push_bind(v.manufactured_date)
            .push_bind(v.age_of_vehicle());
    });

    let result = builder.build().execute(pool).await?;
    Ok(result.rows_affected())
}

/// Fetch vehicles whose age is at most `max_age` years, oldest first.
/// No filter fetches everything; there is no sentinel value.
pub async fn find_by_max_age(
    pool: &PgPool,
    max_age: Option<i32>,
) -> Result<Vec<Vehicle>, sqlx::Error> {
    let rows = match max_age {
        Some(age) => {
            // age <= filter, by manufacture year
            let cutoff_year = Utc::now().year() - age;
            sqlx::query(
                r#"
                SELECT id, first_name, last_name, email, car_make, car_model, vin,
                       manufactured_date, age_of_vehicle
                FROM vehicles
                WHERE EXTRACT(YEAR FROM manufactured_date)::int >= $1
                ORDER BY manufactured_date ASC
                "#,
            )
            .bind(cutoff_year)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query(
                r#"
                SELECT id, first_name, last_name, email, car_make, car_model, vin,
                       manufactured_date, age_of_vehicle
                FROM vehicles
                ORDER BY manufactured_date ASC
                "#,
            )
            .fetch_all(pool)
            .await?
        }
    };

    rows.iter().map(row_to_vehicle).collect()
}
