//! Builders for orders and supplier price sheets.

#![allow(dead_code)]

use rust_decimal::Decimal;
use rust_xlsxwriter::Workbook;

use optiplan::order::{Material, Order, OrderPart, PartGroup};

pub struct OrderBuilder {
    customer: String,
    thickness_mm: Decimal,
    color: String,
    material_name: String,
    parts: Vec<OrderPart>,
}

impl OrderBuilder {
    pub fn new(customer: &str) -> Self {
        Self {
            customer: customer.to_string(),
            thickness_mm: Decimal::from(18),
            color: "Beyaz".to_string(),
            material_name: "MDF 18 Beyaz".to_string(),
            parts: Vec::new(),
        }
    }

    pub fn thickness(mut self, mm: i64) -> Self {
        self.thickness_mm = Decimal::from(mm);
        self
    }

    pub fn color(mut self, color: &str) -> Self {
        self.color = color.to_string();
        self
    }

    pub fn govde(mut self, length: u32, width: u32, grain: &str) -> Self {
        self.parts
            .push(OrderPart::new(PartGroup::Govde, length, width, 1).with_grain(grain));
        self
    }

    pub fn arkalik(mut self, length: u32, width: u32, grain: &str) -> Self {
        self.parts
            .push(OrderPart::new(PartGroup::Arkalik, length, width, 1).with_grain(grain));
        self
    }

    pub fn part(mut self, part: OrderPart) -> Self {
        self.parts.push(part);
        self
    }

    pub fn build(self) -> Order {
        let mut order = Order::new(
            self.customer,
            Material::new(self.thickness_mm, self.color, self.material_name),
        );
        order.parts = self.parts;
        order
    }
}

/// A single-sheet workbook with a header row followed by `rows`.
pub fn price_sheet(headers: &[&str], rows: &[&[&str]]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, header) in headers.iter().enumerate() {
        sheet.write_string(0, col as u16, *header).unwrap();
    }
    for (r, row) in rows.iter().enumerate() {
        for (col, value) in row.iter().enumerate() {
            sheet.write_string(r as u32 + 1, col as u16, *value).unwrap();
        }
    }
    workbook.save_to_buffer().unwrap()
}
