use sqlx::Row;

use supportdesk_core::domain::order::OrderLine;
use supportdesk_core::domain::{OrderId, ProductId};

use super::codec::{parse_date, parse_decimal};
use super::{OrderLineRepository, RepositoryError};
use crate::DbPool;

pub struct SqlOrderLineRepository {
    pool: DbPool,
}

impl SqlOrderLineRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl OrderLineRepository for SqlOrderLineRepository {
    async fn find_for_order(&self, order_id: &OrderId) -> Result<Vec<OrderLine>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT order_id, product_id, price, delivery_date
             FROM order_line WHERE order_id = ? ORDER BY product_id ASC",
        )
        .bind(&order_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(OrderLine {
                    order_id: OrderId(row.try_get("order_id")?),
                    product_id: ProductId(row.try_get("product_id")?),
                    price: parse_decimal("price", row.try_get("price")?)?,
                    delivery_date: parse_date("delivery_date", row.try_get("delivery_date")?)?,
                })
            })
            .collect()
    }

    async fn save(&self, line: OrderLine) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO order_line (order_id, product_id, price, delivery_date)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(order_id, product_id) DO UPDATE SET
                price = excluded.price,
                delivery_date = excluded.delivery_date",
        )
        .bind(&line.order_id.0)
        .bind(&line.product_id.0)
        .bind(line.price.to_string())
        .bind(line.delivery_date.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use supportdesk_core::domain::order::OrderLine;
    use supportdesk_core::domain::{OrderId, ProductId};

    use super::SqlOrderLineRepository;
    use crate::repositories::OrderLineRepository;
    use crate::{connect_with_settings, migrations};

    fn line(product: &str, cents: i64) -> OrderLine {
        OrderLine {
            order_id: OrderId("ORD-1".to_owned()),
            product_id: ProductId(product.to_owned()),
            price: Decimal::new(cents, 2),
            delivery_date: NaiveDate::from_ymd_opt(2026, 3, 10).expect("valid date"),
        }
    }

    #[tokio::test]
    async fn save_upserts_by_order_and_product() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let repo = SqlOrderLineRepository::new(pool);

        repo.save(line("sku-belt", 1_500)).await.expect("save");
        repo.save(line("sku-jacket", 12_950)).await.expect("save");
        repo.save(line("sku-belt", 1_250)).await.expect("resave");

        let lines = repo.find_for_order(&OrderId("ORD-1".to_owned())).await.expect("find");
        assert_eq!(lines, vec![line("sku-belt", 1_250), line("sku-jacket", 12_950)]);
        assert!(repo
            .find_for_order(&OrderId("ORD-2".to_owned()))
            .await
            .expect("find")
            .is_empty());
    }
}
