//! carbonapi v3 protobuf messages.
//!
//! Hand-written prost types matching the `carbonapi_v3_pb` wire schema the
//! go-graphite ecosystem speaks. Only the find and render surfaces are
//! carried; the info/list messages of the full protocol have no consumer
//! here.

/// One target of a `/render/` request.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FetchRequest {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(int64, tag = "2")]
    pub start_time: i64,
    #[prost(int64, tag = "3")]
    pub stop_time: i64,
    #[prost(bool, tag = "4")]
    pub high_precision_timestamps: bool,
    #[prost(string, tag = "5")]
    pub path_expression: ::prost::alloc::string::String,
    #[prost(message, repeated, tag = "6")]
    pub filter_functions: ::prost::alloc::vec::Vec<FilteringFunction>,
    #[prost(int64, tag = "7")]
    pub max_data_points: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FilteringFunction {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(string, repeated, tag = "2")]
    pub arguments: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MultiFetchRequest {
    #[prost(message, repeated, tag = "1")]
    pub metrics: ::prost::alloc::vec::Vec<FetchRequest>,
}

/// One dense series of a `/render/` response.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FetchResponse {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub path_expression: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub consolidation_func: ::prost::alloc::string::String,
    #[prost(int64, tag = "4")]
    pub start_time: i64,
    #[prost(int64, tag = "5")]
    pub stop_time: i64,
    #[prost(int64, tag = "6")]
    pub step_time: i64,
    #[prost(float, tag = "7")]
    pub x_files_factor: f32,
    #[prost(bool, tag = "8")]
    pub high_precision_timestamps: bool,
    #[prost(double, repeated, tag = "9")]
    pub values: ::prost::alloc::vec::Vec<f64>,
    #[prost(string, repeated, tag = "10")]
    pub applied_functions: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(int64, tag = "11")]
    pub request_start_time: i64,
    #[prost(int64, tag = "12")]
    pub request_stop_time: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MultiFetchResponse {
    #[prost(message, repeated, tag = "1")]
    pub metrics: ::prost::alloc::vec::Vec<FetchResponse>,
}

/// A `/metrics/find/` request: glob targets plus the time range they
/// should be resolved against.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MultiGlobRequest {
    #[prost(string, repeated, tag = "1")]
    pub metrics: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(int64, tag = "2")]
    pub start_time: i64,
    #[prost(int64, tag = "3")]
    pub stop_time: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GlobMatch {
    #[prost(string, tag = "1")]
    pub path: ::prost::alloc::string::String,
    #[prost(bool, tag = "2")]
    pub is_leaf: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GlobResponse {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(message, repeated, tag = "2")]
    pub matches: ::prost::alloc::vec::Vec<GlobMatch>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MultiGlobResponse {
    #[prost(message, repeated, tag = "1")]
    pub metrics: ::prost::alloc::vec::Vec<GlobResponse>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn glob_request_round_trips() {
        let request = MultiGlobRequest {
            metrics: vec!["a.*".to_string(), "a.b.*".to_string()],
            start_time: 100,
            stop_time: 200,
        };
        let decoded = MultiGlobRequest::decode(request.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn fetch_response_round_trips_nan_values() {
        let response = MultiFetchResponse {
            metrics: vec![FetchResponse {
                name: "a.b".to_string(),
                path_expression: "a.*".to_string(),
                consolidation_func: "avg".to_string(),
                start_time: 100,
                stop_time: 160,
                step_time: 20,
                values: vec![1.0, f64::NAN, 3.0, 4.0],
                request_start_time: 100,
                request_stop_time: 160,
                ..Default::default()
            }],
        };
        let decoded = MultiFetchResponse::decode(response.encode_to_vec().as_slice()).unwrap();
        let values = &decoded.metrics[0].values;
        assert_eq!(values.len(), 4);
        assert_eq!(values[0], 1.0);
        assert!(values[1].is_nan());
    }
}
