use crate::newtypes::validated_newtype;

validated_newtype!(
    /// The name of a layer.
    ///
    /// It can contain all characters supported by the filesystem, but MUST NOT be either `build`,
    /// `launch` or `store`. Path separators are rejected as well since the name is used as a
    /// directory and file name directly below the layers directory.
    ///
    /// # Examples
    /// ```
    /// use libbuildpack_data::layer::LayerName;
    ///
    /// let name: LayerName = "poetry-dependencies".parse().unwrap();
    /// assert_eq!(name.as_str(), "poetry-dependencies");
    ///
    /// let invalid: Result<LayerName, _> = "launch".parse();
    /// assert!(invalid.is_err());
    /// ```
    LayerName,
    LayerNameError,
    r"^(?!(build|launch|store)$)[^/]+$"
);
