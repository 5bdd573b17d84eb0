#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};

pub const SALES_HEADER: &str = "Product_ID,Sale_Date,Sales_Rep_Region,Sales_Amount,Quantity_Sold,Product_Category,Unit_Cost,Unit_Price,Customer_Type,Discount,Payment_Method,Sales_Channel,Region_and_Sales_Rep";

/// Six sales over three months with every expected column present.
pub const SALES_ROWS: &[&str] = &[
    "P1,2024-01-05,North,100,2,Electronics,10,50,New,0.1,Card,Online,North-Ana",
    "P2,2024-01-20,South,200,1,Furniture,20,200,Returning,0,Cash,Retail,South-Bia",
    "P3,2024-02-03,North,150,3,Electronics,5,50,New,0.05,Card,Online,North-Ana",
    "P4,2024-02-17,East,50,1,Clothing,30,50,Returning,0,Pix,Retail,East-Caio",
    "P5,2024-03-09,South,300,2,Furniture,25,150,New,0.2,Card,Online,South-Bia",
    "P6,2024-03-28,East,0,0,Clothing,0,40,Returning,0,Cash,Retail,East-Caio",
];

pub fn sales_csv() -> String {
    let mut data = String::from(SALES_HEADER);
    data.push('\n');
    for row in SALES_ROWS {
        data.push_str(row);
        data.push('\n');
    }
    data
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}
