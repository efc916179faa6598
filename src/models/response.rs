use serde::{Deserialize, Serialize};

/// Envelope shared by every API response: `success` plus either
/// `data` (with `count` for lists) or a `message`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn data(data: T) -> Self {
        Self {
            success: true,
            count: None,
            data: Some(data),
            message: None,
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            count: None,
            data: None,
            message: Some(message.into()),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            count: None,
            data: None,
            message: Some(message.into()),
        }
    }
}

impl<T> ApiResponse<Vec<T>> {
    pub fn list(items: Vec<T>) -> Self {
        Self {
            success: true,
            count: Some(items.len()),
            data: Some(items),
            message: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_list_envelope_counts_items() {
        let response = ApiResponse::list(vec![1, 2, 3]);
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"success": true, "count": 3, "data": [1, 2, 3]})
        );

        let empty: ApiResponse<Vec<u32>> = ApiResponse::list(vec![]);
        assert_eq!(
            serde_json::to_value(&empty).unwrap(),
            json!({"success": true, "count": 0, "data": []})
        );
    }

    #[test]
    fn test_failure_envelope() {
        let response: ApiResponse<()> = ApiResponse::failure("Booking not found");
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"success": false, "message": "Booking not found"})
        );
    }
}
