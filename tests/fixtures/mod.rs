//! CSV fixture builders shared by the integration and E2E tests.

use uuid::Uuid;

/// A well-formed CSV batch with unique emails and VINs per call, so
/// repeated test runs never trip the bulk insert.
pub fn valid_csv(rows: usize) -> String {
    let mut out = String::from(
        "first_name,last_name,email,car_make,car_model,vin,manufactured_date\n",
    );
    for i in 0..rows {
        let tag = Uuid::new_v4().simple().to_string();
        out.push_str(&format!(
            "Ada{i},Lovelace,ada{i}.{tag}@example.com,Toyota,Corolla,VIN{tag},2020-03-{day:02}\n",
            day = (i % 27) + 1,
        ));
    }
    out
}

/// Same shape but with camelCase headers; the importer accepts both.
pub fn camel_case_csv() -> String {
    let tag = Uuid::new_v4().simple().to_string();
    format!(
        "firstName,lastName,email,carMake,carModel,vin,manufacturedDate\n\
         Grace,Hopper,grace.{tag}@example.com,Ford,Focus,VIN{tag},2019-07-15\n"
    )
}

/// Three rows where the middle one has no email and must be rejected
/// without affecting its neighbors.
pub fn csv_with_bad_row() -> String {
    let a = Uuid::new_v4().simple().to_string();
    let b = Uuid::new_v4().simple().to_string();
    format!(
        "first_name,last_name,email,car_make,car_model,vin,manufactured_date\n\
         Alan,Turing,alan.{a}@example.com,Honda,Civic,VIN{a},2021-01-10\n\
         Kurt,Godel,,Mazda,3,VINBAD{a},2021-02-11\n\
         Emmy,Noether,emmy.{b}@example.com,Tesla,Model 3,VIN{b},2022-05-20\n"
    )
}
