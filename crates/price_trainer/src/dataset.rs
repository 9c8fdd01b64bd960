//! Raw training CSV loading
//!
//! Columns are looked up by header name; extra columns are ignored. Every
//! row must carry a positive `selling_price`.

use carprice_core::schema::TARGET_COLUMN;
use carprice_core::CarAttributes;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::errors::TrainerError;

/// Columns every raw training file must provide
pub const RAW_COLUMNS: [&str; 12] = [
    "name",
    "year",
    TARGET_COLUMN,
    "km_driven",
    "fuel",
    "seller_type",
    "transmission",
    "owner",
    "mileage",
    "engine",
    "max_power",
    "seats",
];

/// Raw cars with their prices, in file order
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawDataset {
    pub records: Vec<CarAttributes>,
    pub prices: Vec<f64>,
}

impl RawDataset {
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self, TrainerError> {
        Self::from_reader(File::open(path.as_ref())?)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, TrainerError> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let headers = csv_reader.headers()?.clone();

        let mut positions = [0usize; RAW_COLUMNS.len()];
        for (slot, column) in positions.iter_mut().zip(RAW_COLUMNS) {
            *slot = headers
                .iter()
                .position(|h| h.trim() == column)
                .ok_or_else(|| TrainerError::MissingColumn(column.to_string()))?;
        }
        let [name, year, price, km, fuel, seller, transmission, owner, mileage, engine, power, seats] =
            positions;

        let mut dataset = Self::default();
        for (i, record) in csv_reader.records().enumerate() {
            let record = record?;
            let line = i + 2;
            let field = |pos: usize| record.get(pos).unwrap_or("").trim();
            let number = |pos: usize, column: &str| -> Result<f64, TrainerError> {
                field(pos)
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| TrainerError::InvalidValue {
                        line,
                        column: column.to_string(),
                        value: field(pos).to_string(),
                    })
            };

            let target = field(price)
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && *v > 0.0)
                .ok_or(TrainerError::InvalidTarget { line })?;

            let year_value = number(year, "year")?;
            let car = CarAttributes {
                name: field(name).to_string(),
                year: year_value.trunc() as i32,
                km_driven: number(km, "km_driven")?,
                engine: number(engine, "engine")?,
                max_power: number(power, "max_power")?,
                mileage: number(mileage, "mileage")?,
                seats: number(seats, "seats")?,
                fuel: field(fuel).to_string(),
                seller_type: field(seller).to_string(),
                transmission: field(transmission).to_string(),
                owner: field(owner).to_string(),
            };

            dataset.records.push(car);
            dataset.prices.push(target);
        }

        if dataset.records.is_empty() {
            return Err(TrainerError::EmptyDataset);
        }
        Ok(dataset)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "name,year,selling_price,km_driven,fuel,seller_type,transmission,owner,mileage,engine,max_power,seats,torque";

    #[test]
    fn reads_columns_by_name() {
        let csv = format!(
            "{HEADER}\nMaruti Swift,2014,450000,145500,Diesel,Individual,Manual,First Owner,23.4,1248,74,5,190Nm\n"
        );
        let dataset = RawDataset::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.prices, vec![450000.0]);

        let car = &dataset.records[0];
        assert_eq!(car.name, "Maruti Swift");
        assert_eq!(car.year, 2014);
        assert_eq!(car.engine, 1248.0);
        assert_eq!(car.owner, "First Owner");
    }

    #[test]
    fn missing_column_is_reported() {
        let err = RawDataset::from_reader("name,year\nA,2010\n".as_bytes()).unwrap_err();
        assert!(matches!(err, TrainerError::MissingColumn(c) if c == "selling_price"));
    }

    #[test]
    fn rejects_bad_targets_and_values() {
        let csv = format!("{HEADER}\nA,2014,0,1,Diesel,Dealer,Manual,First Owner,20,1200,80,5,x\n");
        assert!(matches!(
            RawDataset::from_reader(csv.as_bytes()),
            Err(TrainerError::InvalidTarget { line: 2 })
        ));

        let csv = format!("{HEADER}\nA,2014,100,1,Diesel,Dealer,Manual,First Owner,20 kmpl,1200,80,5,x\n");
        assert!(matches!(
            RawDataset::from_reader(csv.as_bytes()),
            Err(TrainerError::InvalidValue { column, .. }) if column == "mileage"
        ));
    }

    #[test]
    fn empty_file_is_an_error() {
        assert!(matches!(
            RawDataset::from_reader(format!("{HEADER}\n").as_bytes()),
            Err(TrainerError::EmptyDataset)
        ));
    }
}
