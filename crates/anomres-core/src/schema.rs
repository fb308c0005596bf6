/// Arrow schema definitions for job result records.
pub mod results {
    use std::sync::Arc;

    use arrow::array::{ArrayRef, BooleanArray, Float64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;

    use crate::error::ResultsError;
    use crate::partition_score::{fields, PartitionScore};

    pub const HAD_BIG_NORMALISED_UPDATE: &str = "had_big_normalised_update";

    /// Schema for partition score rows.
    ///
    /// Carries the transient flag as a column so analytical views can highlight
    /// rows the normalization pass revised.
    pub fn partition_score_schema() -> Schema {
        Schema::new(vec![
            Field::new(fields::PARTITION_FIELD_NAME, DataType::Utf8, false),
            Field::new(fields::PARTITION_FIELD_VALUE, DataType::Utf8, false),
            Field::new(fields::ANOMALY_SCORE, DataType::Float64, false),
            Field::new(fields::PROBABILITY, DataType::Float64, false),
            Field::new(HAD_BIG_NORMALISED_UPDATE, DataType::Boolean, false),
        ])
    }

    pub fn partition_scores_to_batch(scores: &[PartitionScore]) -> Result<RecordBatch, ResultsError> {
        let names: StringArray = scores.iter().map(|s| Some(s.partition_field_name())).collect();
        let values: StringArray = scores.iter().map(|s| Some(s.partition_field_value())).collect();
        let anomaly: Float64Array = scores.iter().map(|s| Some(s.anomaly_score())).collect();
        let probability: Float64Array = scores.iter().map(|s| Some(s.probability())).collect();
        let flags: BooleanArray = scores
            .iter()
            .map(|s| Some(s.had_big_normalised_update()))
            .collect();

        let columns: Vec<ArrayRef> = vec![
            Arc::new(names),
            Arc::new(values),
            Arc::new(anomaly),
            Arc::new(probability),
            Arc::new(flags),
        ];
        Ok(RecordBatch::try_new(
            Arc::new(partition_score_schema()),
            columns,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use arrow::array::{Array, BooleanArray, Float64Array, StringArray};

    use super::results;
    use crate::PartitionScore;

    #[test]
    fn partition_score_schema_has_expected_fields() {
        let schema = results::partition_score_schema();
        assert_eq!(schema.fields().len(), 5);
        assert!(schema.field_with_name("partition_field_name").is_ok());
        assert!(schema.field_with_name("probability").is_ok());
        assert!(schema.field_with_name("had_big_normalised_update").is_ok());
    }

    #[test]
    fn batch_carries_every_score() {
        let mut revised = PartitionScore::new("user", "alice", 12.0, 0.2);
        revised.raise_big_normalised_update_flag();
        let scores = vec![PartitionScore::new("hostname", "host-42", 87.5, 0.0013), revised];

        let batch = results::partition_scores_to_batch(&scores).unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.num_columns(), 5);

        let values = batch
            .column_by_name("partition_field_value")
            .unwrap()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(values.value(1), "alice");

        let anomaly = batch
            .column_by_name("anomaly_score")
            .unwrap()
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert_eq!(anomaly.value(0), 87.5);

        let flags = batch
            .column_by_name("had_big_normalised_update")
            .unwrap()
            .as_any()
            .downcast_ref::<BooleanArray>()
            .unwrap();
        assert!(!flags.value(0));
        assert!(flags.value(1));
        assert_eq!(flags.null_count(), 0);
    }

    #[test]
    fn empty_batch_is_valid() {
        let batch = results::partition_scores_to_batch(&[]).unwrap();
        assert_eq!(batch.num_rows(), 0);
    }
}
